//! Canned texts: fillers for unselected private messages, the error apology, and greetings.

/// Non-committal acknowledgements sent when a private message is not picked for a full reply.
pub const FILLERS: &[&str] = &[
    "Noted.",
    "Hm.",
    "Interesting.",
    "Go on...",
    "I see.",
    "Fair enough.",
    "Mhm.",
    "If you say so.",
    "Could be.",
    "Tell me more some other time.",
    "That's one way to look at it.",
    "Huh.",
    "Right.",
    "Okay then.",
    "Let me sleep on that.",
    "Bold claim.",
    "Sure, sure.",
    "No comment.",
];

/// Sent when generating or delivering a reply fails. Never carries error details.
pub const ERROR_REPLY: &str = "Something went sideways on my end. Try me again in a bit.";

/// `/start` in a private chat: first message after the sticker.
pub const START_INTRO: &str = "*Hey there!* I'm a bot with opinions and very little patience. \
I don't answer everything, but when I do, I mean it.";

/// `/start`: closing call to action.
pub const START_CALL_TO_ACTION: &str =
    "Say something worth answering, or add me to a group and let the fun begin.";

/// Bot added to a group: announcement sent first.
pub const WELCOME_ANNOUNCEMENT: &str = "*Well, well.* Somebody invited me in here.";

/// Bot added to a group: introduction sent after the sticker.
pub const WELCOME_INTRODUCTION: &str =
    "I'll chime in now and then. Mention me or reply to me if you want my attention.";
