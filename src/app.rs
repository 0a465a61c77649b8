use std::path::PathBuf;
use std::sync::mpsc;

use eframe::egui;
use image::RgbaImage;
use uuid::Uuid;

use warpfe::effect::{EffectKind, PARAM_STEP, RADIUS_RANGE, STRENGTH_RANGE};
use warpfe::engine::{self, EffectEngine, EngineBackend};
use warpfe::io::{self, IoResult};
use warpfe::mapper::{self, DisplayBox};
use warpfe::selection::{SelectionMode, SelectionOverlay};
use warpfe::session::{EditorEvent, EditorSession};
use warpfe::settings::AppSettings;
use warpfe::{log_err, log_info};

/// Tallest the source image is shown, in points.
const MAX_SOURCE_HEIGHT: f32 = 500.0;
const OVERLAY_RED: egui::Color32 = egui::Color32::from_rgb(255, 0, 0);

/// GPU texture mirror of a raster, re-uploaded when its key moves
/// (surface revision, or image id for the source).
struct TextureCache<K> {
    handle: Option<egui::TextureHandle>,
    key: Option<K>,
}

impl<K> Default for TextureCache<K> {
    fn default() -> Self {
        Self { handle: None, key: None }
    }
}

impl<K: PartialEq> TextureCache<K> {
    fn sync(&mut self, ctx: &egui::Context, name: &str, image: &RgbaImage, key: K) -> Option<&egui::TextureHandle> {
        if image.width() == 0 || image.height() == 0 {
            self.handle = None;
            self.key = Some(key);
            return None;
        }
        if self.key.as_ref() != Some(&key) || self.handle.is_none() {
            let size = [image.width() as usize, image.height() as usize];
            let color_image = egui::ColorImage::from_rgba_unmultiplied(size, image.as_raw());
            match self.handle.as_mut() {
                Some(tex) => tex.set(color_image, egui::TextureOptions::LINEAR),
                None => {
                    self.handle = Some(ctx.load_texture(name, color_image, egui::TextureOptions::LINEAR));
                }
            }
            self.key = Some(key);
        }
        self.handle.as_ref()
    }
}

pub struct WarpFEApp {
    settings: AppSettings,
    session: EditorSession,
    engine: Option<Box<dyn EffectEngine>>,
    /// Backend the current `engine` was built for.
    engine_backend: EngineBackend,

    io_sender: mpsc::Sender<IoResult>,
    io_receiver: mpsc::Receiver<IoResult>,
    /// Path of the load in flight, shown in the status bar.
    loading_path: Option<PathBuf>,

    source_tex: TextureCache<Uuid>,
    original_tex: TextureCache<u64>,
    output_tex: TextureCache<u64>,

    status: String,
}

impl WarpFEApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, settings: AppSettings) -> Self {
        let (io_sender, io_receiver) = mpsc::channel();
        let mut session = EditorSession::new(settings.effect_parameters(), settings.selection_mode);
        session.set_auto_apply(settings.auto_apply);
        let engine = engine::create_engine(settings.engine, &settings.preferred_gpu);
        let status = match engine.as_deref() {
            Some(e) => format!("Ready ({} engine)", e.name()),
            None => "Effect engine unavailable, effects are disabled".to_string(),
        };
        Self {
            engine_backend: settings.engine,
            settings,
            session,
            engine,
            io_sender,
            io_receiver,
            loading_path: None,
            source_tex: TextureCache::default(),
            original_tex: TextureCache::default(),
            output_tex: TextureCache::default(),
            status,
        }
    }

    fn open_path(&mut self, path: PathBuf) {
        self.send(EditorEvent::LoadStarted);
        let generation = self.session.generation();
        log_info!("Loading {} (generation {})", path.display(), generation);
        self.status = format!("Loading {}…", path.display());
        self.loading_path = Some(path.clone());
        io::spawn_load(path, generation, self.io_sender.clone());
    }

    /// Feed one event to the session and surface any error in the status bar.
    fn send(&mut self, event: EditorEvent) {
        match self.session.dispatch(event, self.engine.as_deref()) {
            Ok(true) => {
                self.status = format!(
                    "{} applied (strength {:.2}, radius {:.2})",
                    self.session.params().kind.label(),
                    self.session.params().strength(),
                    self.session.params().radius()
                );
            }
            Ok(false) => {}
            Err(e) => self.status = e.to_string(),
        }
    }

    fn poll_io(&mut self) {
        while let Ok(result) = self.io_receiver.try_recv() {
            match result {
                IoResult::ImageLoaded { generation, image, path } => {
                    if generation == self.session.generation() {
                        self.loading_path = None;
                        self.status = format!("Loaded {} ({}x{}). Click the image to select", path.display(), image.width(), image.height());
                    }
                    self.send(EditorEvent::ImageLoaded { generation, image, path: Some(path) });
                }
                IoResult::LoadFailed { generation, path, error } => {
                    if generation == self.session.generation() {
                        self.loading_path = None;
                        self.status = format!("Could not load {}: {}", path.display(), error);
                    }
                    self.send(EditorEvent::LoadFailed { generation, error });
                }
                IoResult::SaveComplete { path } => {
                    self.status = format!("Saved {}", path.display());
                }
                IoResult::SaveFailed { path, error } => {
                    log_err!("Save to {} failed: {}", path.display(), error);
                    self.status = format!("Save failed: {}", error);
                }
            }
        }
    }

    fn rebuild_engine_if_needed(&mut self) {
        if self.settings.engine == self.engine_backend {
            return;
        }
        self.engine_backend = self.settings.engine;
        self.engine = engine::create_engine(self.engine_backend, &self.settings.preferred_gpu);
        self.status = match self.engine.as_deref() {
            Some(e) => format!("Switched to {} engine", e.name()),
            None => "Effect engine unavailable, effects are disabled".to_string(),
        };
        if self.engine.is_some() {
            self.send(EditorEvent::EngineChanged);
        }
    }

    fn save_output(&mut self) {
        if self.session.output.is_empty() {
            return;
        }
        let source_path = self.session.source().and_then(|s| s.path.clone());
        if let Some(path) = io::pick_save_path(source_path.as_deref()) {
            io::spawn_save(
                self.session.output.image().clone(),
                path,
                self.settings.jpeg_quality,
                self.io_sender.clone(),
            );
            self.status = "Saving…".to_string();
        }
    }

    fn copy_output(&mut self) {
        if self.session.output.is_empty() {
            return;
        }
        self.status = match io::copy_to_clipboard(self.session.output.image()) {
            Ok(()) => "Copied result to clipboard".to_string(),
            Err(e) => format!("Clipboard error: {}", e),
        };
    }

    fn show_top_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if ui.button("Open image…").clicked()
                    && let Some(path) = io::pick_open_path()
                {
                    self.open_path(path);
                }
                let has_output = !self.session.output.is_empty();
                if ui.add_enabled(has_output, egui::Button::new("Save result…")).clicked() {
                    self.save_output();
                }
                if ui.add_enabled(has_output, egui::Button::new("Copy result")).clicked() {
                    self.copy_output();
                }
            });
        });
    }

    fn show_controls(&mut self, ctx: &egui::Context) {
        egui::SidePanel::left("controls").resizable(false).min_width(240.0).show(ctx, |ui| {
            ui.add_space(6.0);
            ui.heading("Effect");
            ui.add_space(4.0);

            let mut kind = self.session.params().kind;
            let mut strength = self.session.params().strength();
            let mut radius = self.session.params().radius();
            let mut mode = self.session.selection_mode();
            let mut auto_apply = self.session.auto_apply();
            let mut events = Vec::new();

            egui::Grid::new("effect_params").num_columns(2).spacing([8.0, 6.0]).show(ui, |ui| {
                ui.label("Effect");
                egui::ComboBox::from_id_source("effect_kind")
                    .selected_text(kind.label())
                    .show_ui(ui, |ui| {
                        for k in EffectKind::ALL {
                            ui.selectable_value(&mut kind, k, k.label());
                        }
                    });
                ui.end_row();

                ui.label("Strength");
                ui.add(egui::Slider::new(&mut strength, STRENGTH_RANGE).step_by(PARAM_STEP).max_decimals(2));
                ui.end_row();

                ui.label("Radius");
                ui.add(egui::Slider::new(&mut radius, RADIUS_RANGE).step_by(PARAM_STEP).max_decimals(2));
                ui.end_row();

                ui.label("Selection");
                ui.horizontal(|ui| {
                    for m in SelectionMode::ALL {
                        ui.radio_value(&mut mode, m, m.label());
                    }
                });
                ui.end_row();
            });

            ui.label(
                egui::RichText::new("Radius is a fraction of the smaller image side")
                    .size(10.0)
                    .weak(),
            );
            ui.add_space(6.0);
            ui.checkbox(&mut auto_apply, "Apply automatically");

            if kind != self.session.params().kind {
                events.push(EditorEvent::SetEffectKind(kind));
            }
            if strength != self.session.params().strength() {
                events.push(EditorEvent::SetStrength(strength));
            }
            if radius != self.session.params().radius() {
                events.push(EditorEvent::SetRadius(radius));
            }
            if mode != self.session.selection_mode() {
                events.push(EditorEvent::SetSelectionMode(mode));
            }
            if auto_apply != self.session.auto_apply() {
                events.push(EditorEvent::SetAutoApply(auto_apply));
            }

            ui.add_space(8.0);
            let can_apply = self.session.can_apply();
            if ui
                .add_enabled(can_apply, egui::Button::new("Apply Effect").min_size(egui::vec2(120.0, 28.0)))
                .clicked()
            {
                events.push(EditorEvent::ApplyRequested);
            }

            ui.add_space(12.0);
            ui.separator();
            ui.heading("Engine");
            egui::ComboBox::from_id_source("engine_backend")
                .selected_text(self.settings.engine.label())
                .show_ui(ui, |ui| {
                    for b in EngineBackend::ALL {
                        ui.selectable_value(&mut self.settings.engine, b, b.label());
                    }
                });
            if let Some(e) = self.engine.as_deref() {
                let active = match e.adapter() {
                    Some(adapter) => format!("Active: {} ({})", e.name(), adapter),
                    None => format!("Active: {}", e.name()),
                };
                ui.label(egui::RichText::new(active).size(10.0).weak());
            }

            let dirty = !events.is_empty();
            for event in events {
                self.send(event);
            }
            if dirty {
                self.settings.store_parameters(self.session.params());
                self.settings.selection_mode = self.session.selection_mode();
                self.settings.auto_apply = self.session.auto_apply();
            }
        });
    }

    fn show_status(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if self.loading_path.is_some() {
                    ui.spinner();
                }
                ui.label(&self.status);
            });
        });
    }

    fn show_images(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::both().show(ui, |ui| {
                self.show_source(ui);
                ui.add_space(10.0);
                ui.horizontal_top(|ui| {
                    let ctx = ui.ctx().clone();
                    let original = self.original_tex.sync(
                        &ctx,
                        "original_preview",
                        self.session.original.image(),
                        self.session.original.revision(),
                    );
                    show_surface(ui, "Original", original);
                    ui.add_space(16.0);
                    let output = self.output_tex.sync(
                        &ctx,
                        "modified_output",
                        self.session.output.image(),
                        self.session.output.revision(),
                    );
                    show_surface(ui, "Modified", output);
                });
            });
        });
    }

    /// The clickable, scaled-to-fit source image with the live selection overlay.
    fn show_source(&mut self, ui: &mut egui::Ui) {
        let Some(source) = self.session.source() else {
            ui.label(if self.loading_path.is_some() {
                "Loading…"
            } else {
                "Open an image (or drop one here) to begin."
            });
            return;
        };
        let (w, h) = (source.width(), source.height());
        let ctx = ui.ctx().clone();
        let Some(tex) = self.source_tex.sync(&ctx, "source_image", &source.image, source.id) else {
            return;
        };
        let tex_id = tex.id();

        let scale = (ui.available_width() / w as f32).min(MAX_SOURCE_HEIGHT / h as f32).min(1.0);
        let size = egui::vec2(w as f32 * scale, h as f32 * scale);
        let (rect, response) = ui.allocate_exact_size(size, egui::Sense::click());
        let response = response.on_hover_cursor(egui::CursorIcon::Crosshair);
        let uv = egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0));
        ui.painter().image(tex_id, rect, uv, egui::Color32::WHITE);

        let display = DisplayBox::from(rect);
        if let Some(sel) = self.session.selection() {
            paint_overlay(ui.painter(), &sel.overlay(), display, w, h);
        }

        if response.clicked()
            && let Some(pos) = response.interact_pointer_pos()
        {
            self.send(EditorEvent::PointerClick { x: pos.x, y: pos.y, display });
        }
    }
}

fn show_surface(ui: &mut egui::Ui, title: &str, tex: Option<&egui::TextureHandle>) {
    ui.vertical(|ui| {
        ui.label(egui::RichText::new(title).strong());
        match tex {
            Some(tex) => {
                let [tw, th] = tex.size();
                let scale = (MAX_SOURCE_HEIGHT / th as f32).min(1.0);
                let size = egui::vec2(tw as f32 * scale, th as f32 * scale);
                ui.image((tex.id(), size));
            }
            None => {
                ui.label(egui::RichText::new("-").weak());
            }
        }
    });
}

/// Draw a selection overlay in screen space over the displayed source image.
fn paint_overlay(painter: &egui::Painter, overlay: &SelectionOverlay, display: DisplayBox, w: u32, h: u32) {
    let stroke = egui::Stroke::new(2.0, OVERLAY_RED);
    match overlay {
        SelectionOverlay::Marker { center, radius } => {
            if let Some((x, y)) = mapper::image_to_screen(*center, display, w, h) {
                // Marker keeps its on-screen size regardless of zoom
                painter.circle_filled(egui::pos2(x, y), *radius, OVERLAY_RED);
            }
        }
        SelectionOverlay::DashedRect(r) => {
            let tl = mapper::image_to_screen(mapper::ImagePoint::new(r.x, r.y), display, w, h);
            let br = mapper::image_to_screen(mapper::ImagePoint::new(r.x + r.width, r.y + r.height), display, w, h);
            if let (Some((x0, y0)), Some((x1, y1))) = (tl, br) {
                let path = [
                    egui::pos2(x0, y0),
                    egui::pos2(x1, y0),
                    egui::pos2(x1, y1),
                    egui::pos2(x0, y1),
                    egui::pos2(x0, y0),
                ];
                painter.extend(egui::Shape::dashed_line(&path, stroke, 5.0, 5.0));
            }
        }
    }
}

impl eframe::App for WarpFEApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_io();
        self.rebuild_engine_if_needed();

        // Drag-and-drop: the last dropped file wins
        let dropped: Vec<egui::DroppedFile> = ctx.input(|i| i.raw.dropped_files.clone());
        if let Some(path) = dropped.into_iter().filter_map(|f| f.path).last() {
            self.open_path(path);
        }

        self.show_top_bar(ctx);
        self.show_controls(ctx);
        self.show_status(ctx);
        self.show_images(ctx);

        if self.loading_path.is_some() {
            ctx.request_repaint();
        }
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.settings.save();
        log_info!("Session ended");
    }
}
