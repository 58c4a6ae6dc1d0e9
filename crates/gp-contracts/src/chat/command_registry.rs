#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandSpec {
    pub command: &'static str,
    pub action: &'static str,
}

/// Commands that are part of the message itself and go to the controller.
pub(crate) const MESSAGE_COMMANDS: &[CommandSpec] = &[CommandSpec {
    command: "imagine",
    action: "send",
}];

pub(crate) const RAW_ARG_COMMANDS: &[CommandSpec] = &[CommandSpec {
    command: "search",
    action: "search",
}];

pub(crate) const SINGLE_PATH_COMMANDS: &[CommandSpec] = &[CommandSpec {
    command: "attach",
    action: "attach",
}];

pub(crate) const NO_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "detach",
        action: "detach",
    },
    CommandSpec {
        command: "history",
        action: "history",
    },
    CommandSpec {
        command: "models",
        action: "models",
    },
    CommandSpec {
        command: "help",
        action: "help",
    },
    CommandSpec {
        command: "contact",
        action: "contact",
    },
    CommandSpec {
        command: "quit",
        action: "quit",
    },
    CommandSpec {
        command: "exit",
        action: "quit",
    },
];

pub const CHAT_HELP_COMMANDS: &[&str] = &[
    "/imagine <prompt>",
    "/attach <path>",
    "/detach",
    "/search [term]",
    "/history",
    "/models",
    "/contact",
    "/help",
    "/quit",
];
