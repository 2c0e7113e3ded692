//! The editor facade.
//!
//! [`Editor`] owns the [`Workspace`] and everything that gives its views behavior: the mode
//! matcher, minor modes, class preferences, the key processor, the clipboard and the action
//! registry. Opening a resource through it picks a major mode, derives the view settings from
//! preferences and modelines, styles the document and starts the configured minor modes.

use crate::actions::{ActionArgs, ActionRegistry};
use crate::autoindent::Autoindent;
use crate::error::{ActionError, ModeError, PrefsError, StartupError};
use crate::major::MajorMode;
use crate::matcher::{MAGIC_SIZE, ModeMatcher};
use crate::minor::MinorModeRegistry;
use crate::modeline::{self, DEFAULT_SCAN_LINES, Modeline};
use crate::prefs::ClassPrefs;
use crate::session::Session;
use crate::startup::StartupOptions;
use scribe_core::{
    Clipboard, Document, DocumentId, EditSession, FindFlavor, FindService, StyledTextCtrl,
    ViewId, ViewSettings, Workspace, WorkspaceError,
};
use scribe_keymap::{KeyMap, KeyProcessor, KeyResult, KeyStroke, preset_keymap};
use std::collections::BTreeMap;
use url::Url;

/// Mode state of one view.
#[derive(Debug)]
pub struct ViewModes {
    major: String,
    autoindent: Box<dyn Autoindent>,
    modeline: Modeline,
}

impl ViewModes {
    /// Keyword of the major mode.
    pub fn major(&self) -> &str {
        &self.major
    }

    /// The autoindent strategy of the major mode.
    pub fn autoindent(&self) -> &dyn Autoindent {
        self.autoindent.as_ref()
    }

    /// Settings found in the document's modeline when the mode was set up.
    pub fn modeline(&self) -> &Modeline {
        &self.modeline
    }
}

/// Everything an editing action needs for one view, borrowed at once.
pub struct EditorContext<'a> {
    /// Editing session on the view.
    pub session: EditSession<'a>,
    /// The view's major mode.
    pub mode: &'a MajorMode,
    /// The view's autoindent strategy.
    pub autoindent: &'a dyn Autoindent,
    /// The process-wide clipboard.
    pub clipboard: &'a mut Clipboard,
    /// The minor mode registry.
    pub minor_modes: &'a MinorModeRegistry,
}

/// Workspace plus modes, keys and actions.
#[derive(Debug)]
pub struct Editor {
    workspace: Workspace,
    matcher: ModeMatcher,
    minor_modes: MinorModeRegistry,
    prefs: ClassPrefs,
    keys: KeyProcessor,
    actions: ActionRegistry,
    clipboard: Clipboard,
    views: BTreeMap<ViewId, ViewModes>,
    keymap_view: Option<ViewId>,
    status: String,
}

impl Editor {
    /// Editor for the given startup options, over a fresh workspace.
    pub fn new(options: &StartupOptions) -> Result<Self, StartupError> {
        let keymap = preset_keymap(options.key_bindings)?;
        Ok(Self::with_keymap(Workspace::new(), keymap))
    }

    /// Editor over `workspace` using `keymap` as the global keymap.
    pub fn with_keymap(workspace: Workspace, keymap: KeyMap) -> Self {
        let matcher = ModeMatcher::default();
        let mut prefs = ClassPrefs::new();
        matcher.modes().register_prefs(&mut prefs);
        Self {
            workspace,
            matcher,
            minor_modes: MinorModeRegistry::with_builtins(),
            prefs,
            keys: KeyProcessor::new(keymap),
            actions: ActionRegistry::with_builtins(),
            clipboard: Clipboard::default(),
            views: BTreeMap::new(),
            keymap_view: None,
            status: String::new(),
        }
    }

    /// The documents and views.
    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Mutable access to the documents and views.
    pub fn workspace_mut(&mut self) -> &mut Workspace {
        &mut self.workspace
    }

    /// The mode matcher.
    pub fn matcher(&self) -> &ModeMatcher {
        &self.matcher
    }

    /// Mutable access to the mode matcher, e.g. to register modes.
    pub fn matcher_mut(&mut self) -> &mut ModeMatcher {
        &mut self.matcher
    }

    /// The minor mode registry.
    pub fn minor_modes(&self) -> &MinorModeRegistry {
        &self.minor_modes
    }

    /// Class preferences.
    pub fn prefs(&self) -> &ClassPrefs {
        &self.prefs
    }

    /// Mutable preferences. Changes apply to views set up afterwards.
    pub fn prefs_mut(&mut self) -> &mut ClassPrefs {
        &mut self.prefs
    }

    /// Layer user preferences from YAML over the mode defaults.
    pub fn load_prefs(&mut self, yaml: &str) -> Result<(), PrefsError> {
        self.prefs.load_yaml(yaml)
    }

    /// The key processor.
    pub fn keys(&self) -> &KeyProcessor {
        &self.keys
    }

    /// Mutable access to the key processor.
    pub fn keys_mut(&mut self) -> &mut KeyProcessor {
        &mut self.keys
    }

    /// The action registry.
    pub fn actions(&self) -> &ActionRegistry {
        &self.actions
    }

    /// Mutable access to the action registry.
    pub fn actions_mut(&mut self) -> &mut ActionRegistry {
        &mut self.actions
    }

    /// The process-wide clipboard.
    pub fn clipboard_mut(&mut self) -> &mut Clipboard {
        &mut self.clipboard
    }

    /// Mode state of `view`.
    pub fn view_modes(&self, view: ViewId) -> Option<&ViewModes> {
        self.views.get(&view)
    }

    /// Major mode of `view`.
    pub fn major_mode(&self, view: ViewId) -> Option<&MajorMode> {
        let modes = self.views.get(&view)?;
        self.matcher.modes().get(&modes.major)
    }

    /// Document shown in `view`.
    pub fn document_of(&self, view: ViewId) -> Result<&Document, WorkspaceError> {
        let doc = self.workspace.view(view)?.document_id();
        self.workspace.document(doc)
    }

    /// The echo area: the pending key sequence or the last status message.
    pub fn echo(&self) -> &str {
        match self.keys.echo() {
            "" => &self.status,
            echo => echo,
        }
    }

    /// Show `message` in the echo area.
    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status = message.into();
    }

    // ---------------------------------------------------------------------------------------
    // Opening

    /// Open `url` in a new view. A resource that cannot be read opens an error buffer instead.
    pub fn open_url(&mut self, url: &str) -> Result<ViewId, WorkspaceError> {
        let doc = match self.workspace.open_url(url) {
            Ok(doc) => doc,
            Err(err) => {
                let message = format!("Failed opening {url}:\n\n{err}\n");
                self.workspace.open_error_buffer(&message)
            }
        };
        self.open_document(doc)
    }

    /// Open `text` in a new view.
    pub fn open_text(&mut self, url: Option<Url>, text: &str) -> Result<ViewId, WorkspaceError> {
        let doc = self.workspace.open_text(url, text);
        self.open_document(doc)
    }

    /// Attach a new view to `doc` and set up its modes. A major mode that fails to load is
    /// replaced by an error buffer describing the failure.
    pub fn open_document(&mut self, doc: DocumentId) -> Result<ViewId, WorkspaceError> {
        let view = self.workspace.attach_view(doc, ViewSettings::default())?;
        match self.setup_view(view, None) {
            Ok(()) => Ok(view),
            Err(err) => {
                self.detach(view)?;
                self.open_error_view(&err.to_string())
            }
        }
    }

    fn open_error_view(&mut self, message: &str) -> Result<ViewId, WorkspaceError> {
        let doc = self.workspace.open_error_buffer(message);
        let view = self.workspace.attach_view(doc, ViewSettings::default())?;
        let fallback = self.matcher.fallback().map(|m| m.keyword().to_string());
        if let Err(err) = self.setup_view(view, fallback.as_deref()) {
            tracing::error!(error = %err, "error buffer has no usable mode");
        }
        Ok(view)
    }

    /// Close `view`. Returns `true` if its document was destroyed.
    pub fn detach(&mut self, view: ViewId) -> Result<bool, WorkspaceError> {
        self.views.remove(&view);
        if self.keymap_view == Some(view) {
            self.keymap_view = None;
        }
        self.workspace.detach_view(view)
    }

    /// Switch `view` to the major mode named `keyword`.
    pub fn change_major_mode(&mut self, view: ViewId, keyword: &str) -> Result<(), ActionError> {
        let mode = self
            .matcher
            .match_keyword(keyword)
            .ok_or_else(|| ModeError::UnknownMode(keyword.to_string()))?
            .keyword()
            .to_string();
        self.setup_view(view, Some(&mode))?;
        if self.keymap_view == Some(view) {
            self.keymap_view = None;
        }
        Ok(())
    }

    fn setup_view(&mut self, view: ViewId, keyword: Option<&str>) -> Result<(), ActionError> {
        let doc_id = self.workspace.view(view)?.document_id();
        let doc = self.workspace.document(doc_id)?;
        let url = doc.url().cloned();
        let text = doc.text();
        let exists = !doc.is_empty() || url.as_ref().is_none_or(|u| self.workspace.vfs().exists(u));
        let header = &text.as_bytes()[..text.len().min(MAGIC_SIZE)];

        let mode = match keyword {
            Some(keyword) => self
                .matcher
                .match_keyword(keyword)
                .ok_or_else(|| ModeError::UnknownMode(keyword.to_string()))?,
            None => {
                let metadata = url.as_ref().and_then(|u| self.workspace.vfs().metadata(u).ok());
                self.matcher
                    .match_mode(url.as_ref(), metadata.as_ref(), exists.then_some(header))
                    .ok_or_else(|| ModeError::UnknownMode(String::new()))?
                    .mode
            }
        };
        let hierarchy = mode.hierarchy();
        let mut settings = self.prefs.view_settings(&hierarchy);
        let modeline = modeline::scan(&text, DEFAULT_SCAN_LINES);
        let changed = modeline.apply(&mut settings);
        if !changed.is_empty() {
            tracing::debug!(view = view.get(), ?changed, "modeline settings applied");
        }
        let minors = self.prefs.minor_modes(&hierarchy);

        mode.apply(
            self.workspace.document_mut(doc_id)?,
            self.matcher.modes().lexers(),
            &settings,
        )?;

        let mut session = self.workspace.session(view)?;
        for keyword in self.minor_modes.compatible(mode) {
            self.minor_modes.detach(keyword, &mut session);
        }
        if let Some(state) = session.view_mut() {
            state.settings = settings;
            state.major_mode = Some(mode.keyword().to_string());
            if state.service::<FindService>().is_none() {
                state.add_service(Box::new(FindService::new(FindFlavor::Literal)));
            }
        }
        let attached = self.minor_modes.attach_all(&minors, mode, &mut session);
        session.sync();
        tracing::info!(
            view = view.get(),
            mode = %mode.keyword(),
            minor = ?attached,
            "view set up"
        );

        self.views.insert(
            view,
            ViewModes {
                major: mode.keyword().to_string(),
                autoindent: mode.create_autoindent(),
                modeline,
            },
        );
        Ok(())
    }

    /// Borrow everything an editing action needs for `view`.
    pub fn context(&mut self, view: ViewId) -> Result<EditorContext<'_>, ActionError> {
        let modes = self
            .views
            .get(&view)
            .ok_or(WorkspaceError::ViewNotFound(view))?;
        let mode = self
            .matcher
            .modes()
            .get(&modes.major)
            .ok_or_else(|| ModeError::UnknownMode(modes.major.clone()))?;
        Ok(EditorContext {
            session: self.workspace.session(view)?,
            mode,
            autoindent: modes.autoindent.as_ref(),
            clipboard: &mut self.clipboard,
            minor_modes: &self.minor_modes,
        })
    }

    /// Text of every document except the one shown in `view`.
    pub fn other_texts(&self, view: ViewId) -> Vec<String> {
        let current = self.workspace.view(view).ok().map(|v| v.document_id());
        self.workspace
            .document_ids()
            .into_iter()
            .filter(|id| Some(*id) != current)
            .filter_map(|id| self.workspace.document(id).ok())
            .map(Document::text)
            .collect()
    }

    // ---------------------------------------------------------------------------------------
    // Actions and keys

    /// Run the action `name` on `view`.
    pub fn run_action(
        &mut self,
        view: ViewId,
        name: &str,
        args: &ActionArgs,
    ) -> Result<(), ActionError> {
        let action = self
            .actions
            .get(name)
            .ok_or_else(|| ActionError::Unknown(name.to_string()))?;
        if !action.is_enabled(self, view) {
            return Err(ActionError::Disabled(name.to_string()));
        }
        tracing::debug!(action = %name, view = view.get(), ?args, "running action");
        let result = action.run(self, view, args);
        if let Err(err) = &result {
            self.status = err.to_string();
        }
        result
    }

    fn focus(&mut self, view: ViewId) -> Result<(), ActionError> {
        if self.keymap_view == Some(view) {
            return Ok(());
        }
        let keymap = match self.major_mode(view) {
            Some(mode) => mode.keymap()?,
            None => None,
        };
        self.keys.set_major_keymap(keymap);
        self.keymap_view = Some(view);
        Ok(())
    }

    /// Feed one keystroke, typed in `view`, to the key processor and act on the result.
    pub fn handle_key(&mut self, view: ViewId, spec: &str) -> Result<KeyResult, ActionError> {
        self.focus(view)?;
        let result = self.keys.process(spec)?;
        match &result {
            KeyResult::Dispatch { action, multiplier } => {
                self.status.clear();
                self.run_action(view, action, &ActionArgs::repeated(*multiplier))?;
            }
            KeyResult::PassThrough { key, multiplier } => {
                self.status.clear();
                self.self_insert(view, key, *multiplier)?;
            }
            KeyResult::Undefined(_) | KeyResult::Quit => {
                self.status = self.keys.echo().to_string();
            }
            KeyResult::Pending => {}
        }
        Ok(result)
    }

    /// Handle an unbound keystroke: editing keys go to the autoindent strategy, printable
    /// keys are inserted unless an electric character handler took them.
    fn self_insert(
        &mut self,
        view: ViewId,
        key: &KeyStroke,
        multiplier: i64,
    ) -> Result<(), ActionError> {
        let count = multiplier.unsigned_abs().max(1);
        let mut cx = self.context(view)?;
        let stc: &mut dyn StyledTextCtrl = &mut cx.session;
        for _ in 0..count {
            match key.key() {
                "RETURN" | "RET" => cx.autoindent.electric_return(stc)?,
                "TAB" => cx.autoindent.process_tab(stc)?,
                "BACK" => cx.autoindent.electric_backspace(stc)?,
                "DEL" => cx.autoindent.electric_delete(stc)?,
                _ => {
                    let Some(text) = key.as_text() else {
                        tracing::debug!(%key, "ignoring unbound key");
                        return Ok(());
                    };
                    let mut chars = text.chars();
                    let electric = match (chars.next(), chars.next()) {
                        (Some(ch), None) if cx.autoindent.electric_chars().contains(&ch) => {
                            cx.autoindent.electric_char(stc, ch)?
                        }
                        _ => false,
                    };
                    if !electric {
                        stc.replace_selection(&text)?;
                    }
                }
            }
        }
        Ok(())
    }

    // ---------------------------------------------------------------------------------------
    // Sessions

    /// The URLs of every view, as one frame.
    pub fn session_state(&self) -> Session {
        let mut urls: Vec<String> = Vec::new();
        for view in self.views.keys() {
            if let Ok(doc) = self.document_of(*view)
                && let Some(url) = doc.url()
                && !urls.iter().any(|u| u == url.as_str())
            {
                urls.push(url.to_string());
            }
        }
        let mut session = Session::default();
        session.push_frame(urls);
        session
    }

    /// Reopen every URL of `session`. Returns the new views in order.
    pub fn restore_session(&mut self, session: &Session) -> Result<Vec<ViewId>, WorkspaceError> {
        session
            .frames()
            .iter()
            .flatten()
            .map(|url| self.open_url(url))
            .collect()
    }

    /// Open the startup views: the saved `session` unless `--no-session` was given, then the
    /// `urls` named on the command line. The last view opened becomes active.
    pub fn startup(
        &mut self,
        options: &StartupOptions,
        session: &Session,
        urls: &[String],
    ) -> Result<Vec<ViewId>, WorkspaceError> {
        let mut views = if options.no_session {
            Vec::new()
        } else {
            self.restore_session(session)?
        };
        for url in urls {
            views.push(self.open_url(url)?);
        }
        if let Some(last) = views.last() {
            self.workspace.set_active_view(*last)?;
        }
        tracing::info!(views = views.len(), restored = !options.no_session, "editor started");
        Ok(views)
    }
}
