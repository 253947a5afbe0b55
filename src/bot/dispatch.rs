//! Command table and the synchronous execution of one slash command.
//!
//! The Discord side of a command stops at [`Invocation`]: a resolved
//! [`Route`] plus the parsed options. [`execute`] maps it to exactly one
//! engine or template operation and renders the outcome as a [`Reply`].

use serenity::model::{
    application::{CommandDataOption, CommandDataOptionValue},
    id::{GuildId, UserId},
};
use std::collections::HashMap;
use thiserror::Error;
use tracing::warn;

use crate::{
    error::QueueError,
    queue::QueueEngine,
    templates::{self, AnnouncementSource, TemplateStore},
    ui::{messages, Reply},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    QueueList,
    QueueAdd,
    QueueAddSomeone,
    QueueRemove,
    QueueRemoveSomeone,
    QueueSink,
    QueueSwap,
    QueueMove,
    QueueClear,
    QueueEditSong,
    Next,
    Current,
    NextMsgList,
    NextMsgAdd,
    NextMsgRemove,
}

impl Route {
    pub const ALL: [Route; 15] = [
        Route::QueueList,
        Route::QueueAdd,
        Route::QueueAddSomeone,
        Route::QueueRemove,
        Route::QueueRemoveSomeone,
        Route::QueueSink,
        Route::QueueSwap,
        Route::QueueMove,
        Route::QueueClear,
        Route::QueueEditSong,
        Route::Next,
        Route::Current,
        Route::NextMsgList,
        Route::NextMsgAdd,
        Route::NextMsgRemove,
    ];

    /// Command name and subcommand name, space separated.
    pub fn path(self) -> &'static str {
        match self {
            Route::QueueList => "queue list",
            Route::QueueAdd => "queue add",
            Route::QueueAddSomeone => "queue add-someone",
            Route::QueueRemove => "queue remove",
            Route::QueueRemoveSomeone => "queue remove-someone",
            Route::QueueSink => "queue sink",
            Route::QueueSwap => "queue swap",
            Route::QueueMove => "queue move",
            Route::QueueClear => "queue clear",
            Route::QueueEditSong => "queue edit-song",
            Route::Next => "next",
            Route::Current => "current",
            Route::NextMsgList => "nextmsg list",
            Route::NextMsgAdd => "nextmsg add",
            Route::NextMsgRemove => "nextmsg remove",
        }
    }
}

/// Maps command paths to routes. Built once at startup.
pub struct CommandTable {
    routes: HashMap<&'static str, Route>,
}

impl CommandTable {
    pub fn new() -> Self {
        let routes = Route::ALL.iter().map(|route| (route.path(), *route)).collect();
        Self { routes }
    }

    pub fn resolve(&self, path: &str) -> Option<Route> {
        self.routes.get(path).copied()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl Default for CommandTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Flattens a top-level command and its subcommand into a path such as
/// `"queue add"`, returning the options that belong to the leaf.
pub fn command_path<'a>(name: &str, options: &'a [CommandDataOption]) -> (String, &'a [CommandDataOption]) {
    match options.first() {
        Some(CommandDataOption {
            name: sub,
            value: CommandDataOptionValue::SubCommand(inner),
            ..
        }) => (format!("{} {}", name, sub), inner.as_slice()),
        _ => (name.to_string(), options),
    }
}

/// Every option any command accepts. Absent options stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandArgs {
    pub user: Option<UserId>,
    pub user1: Option<UserId>,
    pub user2: Option<UserId>,
    pub song: Option<String>,
    pub requeue: Option<bool>,
    pub position: Option<i64>,
    pub public: Option<bool>,
    pub template: Option<String>,
    pub name: Option<String>,
}

impl CommandArgs {
    pub fn from_options(options: &[CommandDataOption]) -> Self {
        let mut args = Self::default();

        for option in options {
            let value = &option.value;
            match option.name.as_str() {
                "user" => args.user = value.as_user_id(),
                "user1" => args.user1 = value.as_user_id(),
                "user2" => args.user2 = value.as_user_id(),
                "song" => args.song = non_blank(value.as_str()),
                "requeue" => args.requeue = value.as_bool(),
                "position" => args.position = value.as_i64(),
                "public" => args.public = value.as_bool(),
                "template" => args.template = value.as_str().map(str::to_string),
                "name" => args.name = non_blank(value.as_str()),
                other => warn!("⚠️ Ignoring unknown option '{}'", other),
            }
        }

        args
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

/// One resolved command, ready to run off the gateway task.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub route: Route,
    pub guild: GuildId,
    pub invoker: UserId,
    pub args: CommandArgs,
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error("missing required option '{0}'")]
    MissingOption(&'static str),
}

impl CommandError {
    pub fn reply(&self, invoker: UserId) -> Reply {
        match self {
            CommandError::Queue(err) => messages::error_reply(err, invoker),
            CommandError::MissingOption(name) => {
                Reply::private(format!("❌ Missing option \"{}\".", name))
            }
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, CommandError::Queue(err) if err.is_transient())
    }
}

fn required<T>(value: Option<T>, name: &'static str) -> Result<T, CommandError> {
    value.ok_or(CommandError::MissingOption(name))
}

/// Runs one command against the stores. Blocking: call it from
/// `spawn_blocking` inside the runtime.
pub fn execute(engine: &QueueEngine, templates: &TemplateStore, invocation: &Invocation) -> Result<Reply, CommandError> {
    let Invocation {
        route,
        guild,
        invoker,
        args,
    } = invocation;
    let (guild, invoker) = (*guild, *invoker);

    let reply = match route {
        Route::QueueList => {
            let snapshot = engine.snapshot(guild)?;
            let content = messages::queue_listing(&snapshot);
            if args.public.unwrap_or(false) {
                Reply::public(content)
            } else {
                Reply::private(content)
            }
        }
        Route::QueueAdd => {
            engine.add(guild, invoker, args.song.clone(), args.requeue.unwrap_or(false))?;
            Reply::private("You have been added to the queue.")
        }
        Route::QueueAddSomeone => {
            let user = required(args.user, "user")?;
            engine.add(guild, user, args.song.clone(), args.requeue.unwrap_or(false))?;
            Reply::private(format!("Added {} to the queue.", messages::mention(user)))
        }
        Route::QueueRemove => {
            engine.remove(guild, invoker)?;
            Reply::private("You have been removed from the queue.")
        }
        Route::QueueRemoveSomeone => {
            let user = required(args.user, "user")?;
            engine.remove(guild, user)?;
            Reply::private(format!("Removed {} from the queue.", messages::mention(user)))
        }
        Route::QueueSink => {
            engine.sink(guild, invoker)?;
            Reply::private("You have been moved to the bottom of the queue.")
        }
        Route::QueueSwap => {
            let first = required(args.user1, "user1")?;
            let second = required(args.user2, "user2")?;
            engine.swap(guild, first, second)?;
            Reply::private(format!(
                "Swapped the positions of {} and {}.",
                messages::mention(first),
                messages::mention(second)
            ))
        }
        Route::QueueMove => {
            let user = required(args.user, "user")?;
            let position = required(args.position, "position")?;
            engine.move_to(guild, user, position)?;
            Reply::private(format!("Moved {} to {}.", messages::mention(user), position))
        }
        Route::QueueClear => {
            engine.clear(guild)?;
            Reply::private("Queue cleared.")
        }
        Route::QueueEditSong => {
            let song = required(args.song.as_deref(), "song")?;
            engine.edit_song(guild, invoker, song)?;
            Reply::private(format!("Song updated to \"{}\".", song))
        }
        Route::Next => run_next(engine, templates, guild)?,
        Route::Current => Reply::public(messages::current_performer(engine.current(guild)?.as_ref())),
        Route::NextMsgList => Reply::private(messages::template_listing(&templates.list(guild)?)),
        Route::NextMsgAdd => {
            let template = required(args.template.as_deref(), "template")?;
            let added = templates.add(guild, template, args.name.as_deref())?;
            Reply::private(format!("Added template with name \"{}\".", added.name))
        }
        Route::NextMsgRemove => {
            let name = required(args.name.as_deref(), "name")?;
            let removed = templates.remove(guild, name)?;
            Reply::private(format!("Removed template with name \"{}\".", removed.name))
        }
    };

    Ok(reply)
}

/// Advances the queue and announces the performer taking the stage.
///
/// Once the advance is committed this never fails: a template lookup error
/// falls back to the built-in announcement.
pub fn run_next(engine: &QueueEngine, source: &impl AnnouncementSource, guild: GuildId) -> Result<Reply, CommandError> {
    let entry = engine.advance(guild)?;

    let content = templates::announcement(source, &entry).unwrap_or_else(|err| {
        warn!("⚠️ Template lookup failed in guild {}, using default: {}", guild, err);
        templates::default_announcement(&entry)
    });

    Ok(Reply::announce(content, entry.user_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{storage::connection::tests::temp_database, templates::MockAnnouncementSource};
    use pretty_assertions::assert_eq;

    struct Harness {
        _dir: tempfile::TempDir,
        engine: QueueEngine,
        templates: TemplateStore,
    }

    impl Harness {
        fn new() -> Self {
            let (dir, db) = temp_database();
            Self {
                _dir: dir,
                engine: QueueEngine::new(db.clone()),
                templates: TemplateStore::new(db),
            }
        }

        fn run(&self, route: Route, invoker: u64, args: CommandArgs) -> Result<Reply, CommandError> {
            let invocation = Invocation {
                route,
                guild: GuildId::new(1),
                invoker: UserId::new(invoker),
                args,
            };
            execute(&self.engine, &self.templates, &invocation)
        }
    }

    #[test]
    fn table_resolves_every_route() {
        let table = CommandTable::new();
        assert_eq!(table.len(), Route::ALL.len());

        for route in Route::ALL {
            assert_eq!(table.resolve(route.path()), Some(route));
        }
        assert_eq!(table.resolve("queue shuffle"), None);
    }

    #[test]
    fn options_are_parsed_from_subcommand() {
        let options: Vec<CommandDataOption> = serde_json::from_value(serde_json::json!([{
            "name": "add-someone",
            "type": 1,
            "options": [
                { "name": "user", "type": 6, "value": "42" },
                { "name": "song", "type": 3, "value": "  Toxic " },
                { "name": "requeue", "type": 5, "value": true }
            ]
        }]))
        .unwrap();

        let (path, leaf) = command_path("queue", &options);
        assert_eq!(path, "queue add-someone");

        let args = CommandArgs::from_options(leaf);
        assert_eq!(
            args,
            CommandArgs {
                user: Some(UserId::new(42)),
                song: Some("Toxic".into()),
                requeue: Some(true),
                ..Default::default()
            }
        );
    }

    #[test]
    fn blank_song_is_no_song() {
        let options: Vec<CommandDataOption> = serde_json::from_value(serde_json::json!([
            { "name": "song", "type": 3, "value": "   " }
        ]))
        .unwrap();

        assert_eq!(CommandArgs::from_options(&options).song, None);
    }

    #[test]
    fn add_and_list_through_commands() {
        let h = Harness::new();

        let reply = h
            .run(Route::QueueAdd, 10, CommandArgs { song: Some("Toxic".into()), ..Default::default() })
            .unwrap();
        assert_eq!(reply, Reply::private("You have been added to the queue."));

        let err = h.run(Route::QueueAdd, 10, CommandArgs::default()).unwrap_err();
        assert_eq!(err.reply(UserId::new(10)).content, "You are already in the queue!");

        let listing = h
            .run(Route::QueueList, 10, CommandArgs { public: Some(true), ..Default::default() })
            .unwrap();
        assert!(!listing.ephemeral);
        assert!(listing.content.contains("1. <@10> singing Toxic"));
    }

    #[test]
    fn move_reports_invalid_position() {
        let h = Harness::new();
        h.run(Route::QueueAdd, 10, CommandArgs::default()).unwrap();

        let args = CommandArgs {
            user: Some(UserId::new(10)),
            position: Some(5),
            ..Default::default()
        };
        let err = h.run(Route::QueueMove, 99, args).unwrap_err();
        assert_eq!(err.reply(UserId::new(99)).content, "5 is not a valid queue position.");
    }

    #[test]
    fn missing_option_is_reported() {
        let h = Harness::new();
        let err = h.run(Route::QueueSwap, 1, CommandArgs::default()).unwrap_err();
        assert!(matches!(err, CommandError::MissingOption("user1")));
    }

    #[test]
    fn next_announces_and_pings_new_performer() {
        let h = Harness::new();
        h.run(Route::QueueAdd, 10, CommandArgs { song: Some("Toxic".into()), ..Default::default() })
            .unwrap();

        let reply = h.run(Route::Next, 99, CommandArgs::default()).unwrap();
        assert_eq!(
            reply,
            Reply::announce("<@10> is up next! They'll be singing \"Toxic\"!", UserId::new(10))
        );

        let current = h.run(Route::Current, 99, CommandArgs::default()).unwrap();
        assert_eq!(current.content, "<@10> is currently up!");

        let err = h.run(Route::Next, 99, CommandArgs::default()).unwrap_err();
        let reply = err.reply(UserId::new(99));
        assert_eq!(reply.content, "No one left in the queue!");
        assert!(!reply.ephemeral);
    }

    #[test]
    fn next_falls_back_when_templates_fail() {
        let h = Harness::new();
        let guild = GuildId::new(1);
        h.engine.add(guild, UserId::new(10), None, false).unwrap();

        let mut source = MockAnnouncementSource::new();
        source
            .expect_pick()
            .times(1)
            .returning(|_, _| Err(QueueError::Storage(rusqlite::Error::InvalidQuery)));

        let reply = run_next(&h.engine, &source, guild).unwrap();
        assert_eq!(reply.content, "<@10> is up next!");
        assert_eq!(h.engine.current(guild).unwrap().map(|e| e.user_id), Some(UserId::new(10)));
    }

    #[test]
    fn oversized_announcement_still_fits_discord_limit() {
        let h = Harness::new();
        let guild = GuildId::new(1);
        let performer = UserId::new(987_654_321_987_654_321);
        h.engine.add(guild, performer, Some("Toxic".into()), false).unwrap();

        let mut source = MockAnnouncementSource::new();
        source
            .expect_pick()
            .returning(|_, _| Ok(Some(format!("{{user}} {}", "{song} ".repeat(330)))));

        let reply = run_next(&h.engine, &source, guild).unwrap();
        assert!(reply.content.len() <= messages::MAX_MESSAGE_LEN);
        assert!(reply.content.starts_with("<@987654321987654321> Toxic"));
        assert_eq!(reply.ping, Some(performer));
    }

    #[test]
    fn template_commands_round_trip() {
        let h = Harness::new();
        let args = CommandArgs {
            template: Some("🎤 {user}".into()),
            name: Some("hype".into()),
            ..Default::default()
        };

        let added = h.run(Route::NextMsgAdd, 1, args).unwrap();
        assert_eq!(added.content, "Added template with name \"hype\".");

        let listing = h.run(Route::NextMsgList, 1, CommandArgs::default()).unwrap();
        assert!(listing.content.contains("hype: \"🎤 {user}\""));

        let removed = h
            .run(Route::NextMsgRemove, 1, CommandArgs { name: Some("hype".into()), ..Default::default() })
            .unwrap();
        assert_eq!(removed.content, "Removed template with name \"hype\".");
    }
}
