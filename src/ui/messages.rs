use serenity::model::id::UserId;

use crate::{
    error::QueueError,
    queue::{QueueEntry, QueueSnapshot},
    templates::NextMessageTemplate,
};

/// Discord rejects message content longer than this.
pub const MAX_MESSAGE_LEN: usize = 2000;

/// Text sent back for one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub content: String,
    /// Only the invoking user sees the reply.
    pub ephemeral: bool,
    /// The only user this reply may notify.
    pub ping: Option<UserId>,
}

impl Reply {
    pub fn private(content: impl Into<String>) -> Self {
        Self {
            content: fit(content.into()),
            ephemeral: true,
            ping: None,
        }
    }

    pub fn public(content: impl Into<String>) -> Self {
        Self {
            content: fit(content.into()),
            ephemeral: false,
            ping: None,
        }
    }

    /// Public reply that notifies `user`, used to call the next performer.
    pub fn announce(content: impl Into<String>, user: UserId) -> Self {
        Self {
            ping: Some(user),
            ..Self::public(content)
        }
    }
}

/// Cuts `content` to [`MAX_MESSAGE_LEN`] bytes on a char boundary, marking
/// the cut with an ellipsis.
fn fit(mut content: String) -> String {
    if content.len() <= MAX_MESSAGE_LEN {
        return content;
    }

    let mut end = MAX_MESSAGE_LEN - '…'.len_utf8();
    while !content.is_char_boundary(end) {
        end -= 1;
    }
    content.truncate(end);
    content.push('…');
    content
}

/// Appends `items` while the joined message stays under the limit. The
/// remainder is summarized as "...and N more".
fn push_capped(lines: &mut Vec<String>, items: impl ExactSizeIterator<Item = String>) {
    // Headroom for the "...and N more" line
    let budget = MAX_MESSAGE_LEN - 32;
    let total = items.len();
    let mut length: usize = lines.iter().map(|l| l.len() + 1).sum();

    for (shown, line) in items.enumerate() {
        if length + line.len() + 1 > budget {
            lines.push(format!("...and {} more", total - shown));
            return;
        }
        length += line.len() + 1;
        lines.push(line);
    }
}

pub fn mention(user: UserId) -> String {
    format!("<@{}>", user)
}

/// "You" for the invoking user, a mention for anyone else.
fn subject(user: UserId, invoker: UserId) -> String {
    if user == invoker {
        "You".to_string()
    } else {
        mention(user)
    }
}

/// Renders the stage and the waiting line.
///
/// Lines that would push the message past [`MAX_MESSAGE_LEN`] are replaced
/// by a count of the hidden entries.
pub fn queue_listing(snapshot: &QueueSnapshot) -> String {
    let current = snapshot
        .current
        .as_ref()
        .map_or("nobody".to_string(), |entry| mention(entry.user_id));

    let mut lines = vec![
        format!("Currently Up: {}", current),
        String::new(),
        "Current Queue:".to_string(),
    ];

    if snapshot.waiting.is_empty() {
        lines.push("Queue is empty!".to_string());
        return lines.join("\n");
    }

    push_capped(&mut lines, snapshot.waiting.iter().map(queue_line));
    lines.join("\n")
}

fn queue_line(entry: &QueueEntry) -> String {
    match &entry.song_name {
        Some(song) => format!("{}. {} singing {}", entry.queue_pos, mention(entry.user_id), song),
        None => format!("{}. {}", entry.queue_pos, mention(entry.user_id)),
    }
}

pub fn current_performer(entry: Option<&QueueEntry>) -> String {
    match entry {
        Some(entry) => format!("{} is currently up!", mention(entry.user_id)),
        None => "No one is up!".to_string(),
    }
}

pub fn template_listing(templates: &[NextMessageTemplate]) -> String {
    if templates.is_empty() {
        return "No custom 'up next' messages defined!".to_string();
    }

    let mut lines = vec!["'Up Next' Custom Messages".to_string()];
    push_capped(
        &mut lines,
        templates.iter().map(|t| format!("{}: \"{}\"", t.name, t.msg)),
    );
    lines.join("\n")
}

/// User-facing text for a failed operation.
pub fn error_reply(err: &QueueError, invoker: UserId) -> Reply {
    match err {
        QueueError::AlreadyQueued(user) => {
            let who = subject(*user, invoker);
            let verb = if *user == invoker { "are" } else { "is" };
            Reply::private(format!("{} {} already in the queue!", who, verb))
        }
        QueueError::NotQueued(user) => {
            let who = subject(*user, invoker);
            let verb = if *user == invoker { "are" } else { "is" };
            Reply::private(format!("{} {} not in the queue!", who, verb))
        }
        QueueError::InvalidPosition(position) => {
            Reply::private(format!("{} is not a valid queue position.", position))
        }
        QueueError::EmptyQueue => Reply::public("No one left in the queue!"),
        QueueError::TemplateNotFound(name) => Reply::private(format!(
            "Could not find 'up next' message with name \"{}\"!",
            name
        )),
        QueueError::TemplateNameTaken(name) => Reply::private(format!(
            "A template named \"{}\" already exists!",
            name
        )),
        QueueError::NameSpaceExhausted => {
            Reply::private("Could not find a free template name, please choose one.")
        }
        QueueError::Storage(_) | QueueError::Pool(_) => {
            Reply::private("❌ Something went wrong with the queue storage, please try again.")
        }
    }
}
