// ============================================================================
// EDITOR SESSION - loaded image, selection, parameters and explicit recompute
// ============================================================================
//
// The session owns everything the effect depends on. `recompute` compares a
// snapshot of those dependencies against the one last applied:
//   {effect kind, strength, radius, image-loaded flag, selection, image generation}
// so re-application only happens when one of them actually changed.
//
// Loads are tagged with a generation counter. Starting a new load bumps it,
// and completions carrying an older generation are dropped.
// ============================================================================

use std::path::PathBuf;

use image::RgbaImage;
use uuid::Uuid;

use crate::effect::{self, EffectError, EffectKind, EffectParameters, WarpRequest};
use crate::engine::EffectEngine;
use crate::mapper::DisplayBox;
use crate::selection::{Selection, SelectionMode};
use crate::surface::{self, RenderSurface};

/// The decoded image being edited.
pub struct ImageSource {
    pub id: Uuid,
    pub image: RgbaImage,
    /// `None` for images that did not come from disk (clipboard, tests).
    pub path: Option<PathBuf>,
}

impl ImageSource {
    pub fn new(image: RgbaImage, path: Option<PathBuf>) -> Self {
        Self {
            id: Uuid::new_v4(),
            image,
            path,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn display_name(&self) -> String {
        self.path
            .as_ref()
            .and_then(|p| p.file_name())
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "Untitled".to_string())
    }
}

/// Everything an applied effect was derived from.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Dependencies {
    kind: EffectKind,
    strength: f32,
    radius: f32,
    image_loaded: bool,
    selection: Option<Selection>,
    generation: u64,
}

/// Discrete user/IO actions the session reacts to.
pub enum EditorEvent {
    /// A new load began; read the token back with `generation()`.
    LoadStarted,
    ImageLoaded {
        generation: u64,
        image: RgbaImage,
        path: Option<PathBuf>,
    },
    LoadFailed {
        generation: u64,
        error: String,
    },
    PointerClick {
        x: f32,
        y: f32,
        display: DisplayBox,
    },
    SetEffectKind(EffectKind),
    SetStrength(f32),
    SetRadius(f32),
    SetSelectionMode(SelectionMode),
    SetAutoApply(bool),
    /// A different engine was installed; the last attempt no longer counts.
    EngineChanged,
    ApplyRequested,
}

pub struct EditorSession {
    source: Option<ImageSource>,
    image_loaded: bool,
    selection: Option<Selection>,
    selection_mode: SelectionMode,
    params: EffectParameters,
    generation: u64,
    auto_apply: bool,
    /// Snapshot of the last attempted application (success or failure).
    last_attempt: Option<Dependencies>,
    pub output: RenderSurface,
    pub original: RenderSurface,
    pub last_error: Option<EffectError>,
}

impl Default for EditorSession {
    fn default() -> Self {
        Self::new(EffectParameters::default(), SelectionMode::Point)
    }
}

impl EditorSession {
    pub fn new(params: EffectParameters, selection_mode: SelectionMode) -> Self {
        Self {
            source: None,
            image_loaded: false,
            selection: None,
            selection_mode,
            params,
            generation: 0,
            auto_apply: false,
            last_attempt: None,
            output: RenderSurface::default(),
            original: RenderSurface::default(),
            last_error: None,
        }
    }

    // --- Accessors -------------------------------------------------------

    pub fn source(&self) -> Option<&ImageSource> {
        if self.image_loaded { self.source.as_ref() } else { None }
    }

    pub fn image_loaded(&self) -> bool {
        self.image_loaded
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn selection_mode(&self) -> SelectionMode {
        self.selection_mode
    }

    pub fn params(&self) -> &EffectParameters {
        &self.params
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn auto_apply(&self) -> bool {
        self.auto_apply
    }

    /// The apply control is enabled only with a loaded image and a selection.
    pub fn can_apply(&self) -> bool {
        self.image_loaded && self.source.is_some() && self.selection.is_some()
    }

    // --- Loading ---------------------------------------------------------

    /// Start a new load. Invalidates the previous image and everything derived from it.
    /// Returns the token the completion must carry.
    pub fn begin_load(&mut self) -> u64 {
        self.generation += 1;
        self.image_loaded = false;
        self.source = None;
        self.selection = None;
        self.last_attempt = None;
        self.last_error = None;
        self.output.clear();
        self.original.clear();
        self.generation
    }

    /// Install a decoded image. Stale generations are ignored (returns false).
    pub fn finish_load(&mut self, generation: u64, image: RgbaImage, path: Option<PathBuf>) -> bool {
        if generation != self.generation {
            crate::log_info!(
                "Dropping stale image load (generation {} != {})",
                generation,
                self.generation
            );
            return false;
        }
        let source = ImageSource::new(image, path);
        crate::log_info!(
            "Loaded '{}' ({}x{}) as image {}",
            source.display_name(),
            source.width(),
            source.height(),
            source.id
        );
        self.original.present(&source.image);
        self.source = Some(source);
        self.selection = None;
        self.image_loaded = true;
        true
    }

    /// Record a failed decode. The session stays unloaded.
    pub fn fail_load(&mut self, generation: u64, error: &str) -> bool {
        if generation != self.generation {
            return false;
        }
        crate::log_err!("Image load failed: {}", error);
        self.image_loaded = false;
        self.source = None;
        true
    }

    /// Convenience for synchronous callers (CLI, tests).
    pub fn load_image(&mut self, image: RgbaImage, path: Option<PathBuf>) {
        let generation = self.begin_load();
        self.finish_load(generation, image, path);
    }

    // --- Selection -------------------------------------------------------

    /// Map a pointer click and store the resulting selection.
    ///
    /// `Ok(None)` when the image has no on-screen size yet.
    pub fn click(&mut self, client_x: f32, client_y: f32, display: DisplayBox) -> Result<Option<Selection>, EffectError> {
        let (w, h) = self.loaded_dimensions()?;
        let provider = self.selection_mode.provider();
        let selection = provider.select_at_pointer(client_x, client_y, display, w, h);
        if let Some(sel) = selection {
            self.selection = Some(sel);
        }
        Ok(selection)
    }

    /// Switching strategy drops the current selection; a point is not a region.
    pub fn set_selection_mode(&mut self, mode: SelectionMode) {
        if mode != self.selection_mode {
            self.selection_mode = mode;
            self.selection = None;
        }
    }

    fn loaded_dimensions(&self) -> Result<(u32, u32), EffectError> {
        match (&self.source, self.image_loaded) {
            (Some(src), true) => Ok((src.width(), src.height())),
            _ => Err(EffectError::ImageNotLoaded),
        }
    }

    // --- Parameters ------------------------------------------------------

    pub fn set_effect_kind(&mut self, kind: EffectKind) {
        self.params.kind = kind;
    }

    pub fn set_strength(&mut self, strength: f32) {
        self.params.set_strength(strength);
    }

    pub fn set_radius(&mut self, radius: f32) {
        self.params.set_radius(radius);
    }

    pub fn set_auto_apply(&mut self, enabled: bool) {
        self.auto_apply = enabled;
    }

    // --- Applying --------------------------------------------------------

    fn dependencies(&self) -> Dependencies {
        Dependencies {
            kind: self.params.kind,
            strength: self.params.strength(),
            radius: self.params.radius(),
            image_loaded: self.image_loaded,
            selection: self.selection,
            generation: self.generation,
        }
    }

    /// Apply the current effect unconditionally.
    ///
    /// On failure the surfaces keep their previous content.
    pub fn apply(&mut self, engine: Option<&dyn EffectEngine>) -> Result<(), EffectError> {
        let deps = self.dependencies();
        let result = self.apply_inner(engine);
        self.last_attempt = Some(deps);
        match &result {
            Ok(()) => {
                if let Some(src) = &self.source {
                    crate::log_info!("Output updated for image {}", src.id);
                }
                self.last_error = None;
            }
            Err(e) => {
                crate::log_warn!("Apply failed: {}", e);
                self.last_error = Some(e.clone());
            }
        }
        result
    }

    fn apply_inner(&mut self, engine: Option<&dyn EffectEngine>) -> Result<(), EffectError> {
        let source = match (&self.source, self.image_loaded) {
            (Some(src), true) => src,
            _ => return Err(EffectError::ImageNotLoaded),
        };
        let selection = self.selection.ok_or(EffectError::NoSelection)?;

        let request = WarpRequest::from_parameters(&self.params, selection.center());
        let rendered = effect::apply_effect(engine, &source.image, &request)?;

        self.output.present(&rendered);
        self.output.draw_overlay(&selection.overlay());
        let preview = surface::original_preview(&source.image, Some(&selection));
        self.original.present(&preview);
        Ok(())
    }

    /// Re-apply if any dependency changed since the last attempt.
    /// Returns whether an application was attempted and succeeded.
    pub fn recompute(&mut self, engine: Option<&dyn EffectEngine>) -> Result<bool, EffectError> {
        if !self.can_apply() {
            return Ok(false);
        }
        if self.last_attempt == Some(self.dependencies()) {
            return Ok(false);
        }
        self.apply(engine).map(|()| true)
    }

    /// Process one event. Returns whether the output surface was updated.
    pub fn dispatch(&mut self, event: EditorEvent, engine: Option<&dyn EffectEngine>) -> Result<bool, EffectError> {
        match event {
            EditorEvent::LoadStarted => {
                self.begin_load();
                return Ok(false);
            }
            EditorEvent::ImageLoaded { generation, image, path } => {
                if !self.finish_load(generation, image, path) {
                    return Ok(false);
                }
            }
            EditorEvent::LoadFailed { generation, error } => {
                self.fail_load(generation, &error);
                return Ok(false);
            }
            EditorEvent::PointerClick { x, y, display } => {
                if self.click(x, y, display)?.is_none() {
                    return Ok(false);
                }
            }
            EditorEvent::SetEffectKind(kind) => self.set_effect_kind(kind),
            EditorEvent::SetStrength(s) => self.set_strength(s),
            EditorEvent::SetRadius(r) => self.set_radius(r),
            EditorEvent::SetSelectionMode(mode) => self.set_selection_mode(mode),
            EditorEvent::SetAutoApply(enabled) => self.set_auto_apply(enabled),
            EditorEvent::EngineChanged => self.last_attempt = None,
            EditorEvent::ApplyRequested => {
                return self.apply(engine).map(|()| true);
            }
        }
        if self.auto_apply {
            self.recompute(engine)
        } else {
            Ok(false)
        }
    }
}
