use scribe_core::{DocumentError, WorkspaceError};
use scribe_keymap::KeymapError;
use thiserror::Error;

/// Errors raised while choosing or building a major mode.
#[derive(Debug, Error)]
pub enum ModeError {
    #[error("failed loading major mode '{keyword}': {reason}")]
    /// Construction of a major mode failed; the host shows an error buffer instead.
    MajorModeLoad {
        /// Keyword of the failing mode.
        keyword: String,
        /// What went wrong.
        reason: String,
    },

    #[error("unknown major mode '{0}'")]
    /// No registered mode answers to this keyword.
    UnknownMode(String),
}

/// Errors raised by the modeline parsers in strict mode.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelineError {
    #[error("modeline on line {line}: {reason}")]
    /// A modeline entry could not be understood.
    Parse {
        /// Index of the offending line within the scanned lines.
        line: usize,
        /// What went wrong.
        reason: String,
    },
}

/// Errors raised while loading or reading preferences.
#[derive(Debug, Error)]
pub enum PrefsError {
    #[error("preferences parse error: {0}")]
    /// The preferences file is not valid YAML of the expected shape.
    Parse(#[from] serde_yaml::Error),

    #[error("preferences I/O error: {0}")]
    /// Reading or writing the preferences file failed.
    Io(#[from] std::io::Error),

    #[error("preference '{key}' expects {expected}")]
    /// A value has the wrong type for its key.
    Type {
        /// Preference name.
        key: String,
        /// Expected type name.
        expected: &'static str,
    },
}

/// Errors raised when dispatching an action.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("action '{0}' is disabled")]
    /// The action exists but is not enabled in the current context.
    Disabled(String),

    #[error("unknown action '{0}'")]
    /// No action is registered under this name.
    Unknown(String),

    #[error(transparent)]
    /// The action failed while editing.
    Document(#[from] DocumentError),

    #[error(transparent)]
    /// The action failed at workspace level.
    Workspace(#[from] WorkspaceError),

    #[error("invalid search: {0}")]
    /// The find string could not be compiled.
    Search(String),

    #[error("action '{0}' needs an argument")]
    /// The action was invoked without its required argument.
    MissingArgument(String),

    #[error(transparent)]
    /// The major mode could not be set up.
    Mode(#[from] ModeError),

    #[error(transparent)]
    /// The keymap could not be built or processed.
    Keymap(#[from] KeymapError),
}

/// Errors raised while starting the editor.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("unknown option '{0}'")]
    /// An unrecognized command line option.
    UnknownOption(String),

    #[error("unknown key binding preset '{0}'")]
    /// `--key-bindings=` named no preset.
    UnknownPreset(String),

    #[error(transparent)]
    /// Building the global keymap failed.
    Keymap(#[from] KeymapError),

    #[error(transparent)]
    /// Loading preferences failed.
    Prefs(#[from] PrefsError),
}
