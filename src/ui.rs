use std::time::Duration;

use egui::{ClippedPrimitive, Context, RawInput, Slider, TexturesDelta};
use glam::Vec3;

use crate::params::{self, GalaxyParams};

/// Tessellated panel output for one frame, ready for the GPU pass.
pub struct UiFrame {
    pub primitives: Vec<ClippedPrimitive>,
    pub textures_delta: TexturesDelta,
    pub pixels_per_point: f32,
}

/// Everything one panel pass produces: the paint data, the platform
/// output to hand back to the windowing side, and a parameter snapshot
/// when an edit was committed this frame.
pub struct PanelOutput {
    pub frame: UiFrame,
    pub platform: egui::PlatformOutput,
    pub committed: Option<GalaxyParams>,
}

/// Live readouts shown at the bottom of the panel.
#[derive(Debug, Clone, Copy, Default)]
pub struct PanelStats {
    pub point_count: u32,
    pub last_regeneration: Option<Duration>,
}

/// Settings panel: every generation parameter with its documented range,
/// edited against a draft snapshot.
///
/// Edits accumulate in the draft while a drag is in progress; a committed
/// snapshot is reported only once the pointer is released, so a slider
/// drag triggers one regeneration instead of one per tick.
pub struct SettingsPanel {
    ctx: Context,
    draft: GalaxyParams,
    tracker: CommitTracker,
}

impl SettingsPanel {
    pub fn new(initial: GalaxyParams) -> Self {
        Self {
            ctx: Context::default(),
            draft: initial,
            tracker: CommitTracker::default(),
        }
    }

    /// The egui context, needed to route window events.
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Runs one panel pass over the given input.
    pub fn run(&mut self, raw_input: RawInput, stats: &PanelStats) -> PanelOutput {
        let draft = &mut self.draft;
        let mut changed = false;
        let full_output = self.ctx.run(raw_input, |ctx| {
            changed = draw_panel(ctx, draft, stats);
        });

        let pointer_down = self.ctx.input(|i| i.pointer.any_down());
        let committed = self
            .tracker
            .observe(changed, pointer_down)
            .then_some(self.draft);

        let egui::FullOutput {
            platform_output,
            textures_delta,
            shapes,
            ..
        } = full_output;
        PanelOutput {
            frame: UiFrame {
                primitives: self.ctx.tessellate(shapes),
                textures_delta,
                pixels_per_point: self.ctx.pixels_per_point(),
            },
            platform: platform_output,
            committed,
        }
    }
}

/// Folds per-frame widget changes into a finish-change commit.
#[derive(Debug, Default)]
struct CommitTracker {
    dirty: bool,
}

impl CommitTracker {
    /// Returns true when the accumulated edits should be committed.
    fn observe(&mut self, changed: bool, pointer_down: bool) -> bool {
        if changed {
            self.dirty = true;
        }
        if self.dirty && !pointer_down {
            self.dirty = false;
            true
        } else {
            false
        }
    }
}

fn draw_panel(ctx: &Context, draft: &mut GalaxyParams, stats: &PanelStats) -> bool {
    let mut changed = false;
    egui::Window::new("Galaxy")
        .default_width(260.0)
        .resizable(false)
        .show(ctx, |ui| {
            changed |= ui
                .add(
                    Slider::new(&mut draft.count, params::COUNT_RANGE)
                        .step_by(100.0)
                        .text("count"),
                )
                .changed();
            changed |= ui
                .add(
                    Slider::new(&mut draft.point_size, params::POINT_SIZE_RANGE)
                        .step_by(0.0001)
                        .text("size"),
                )
                .changed();
            changed |= ui
                .add(
                    Slider::new(&mut draft.radius, params::RADIUS_RANGE)
                        .step_by(0.1)
                        .text("radius"),
                )
                .changed();
            changed |= ui
                .add(
                    Slider::new(&mut draft.branch_count, params::BRANCH_COUNT_RANGE)
                        .step_by(1.0)
                        .text("branch"),
                )
                .changed();
            changed |= ui
                .add(
                    Slider::new(&mut draft.spin, params::SPIN_RANGE)
                        .step_by(0.1)
                        .text("spin"),
                )
                .changed();
            changed |= ui
                .add(
                    Slider::new(&mut draft.randomness, params::RANDOMNESS_RANGE)
                        .step_by(0.1)
                        .text("randomness"),
                )
                .changed();
            changed |= color_row(ui, "inside color", &mut draft.inside_color);
            changed |= color_row(ui, "outside color", &mut draft.outside_color);

            ui.separator();
            ui.label(format!("{} points", stats.point_count));
            if let Some(elapsed) = stats.last_regeneration {
                ui.label(format!("rebuilt in {:.1} ms", elapsed.as_secs_f64() * 1000.0));
            }
        });
    changed
}

fn color_row(ui: &mut egui::Ui, label: &str, color: &mut Vec3) -> bool {
    let mut rgb = color.to_array();
    let changed = ui
        .horizontal(|ui| {
            let response = ui.color_edit_button_rgb(&mut rgb);
            ui.label(label);
            response.changed()
        })
        .inner;
    if changed {
        *color = Vec3::from_array(rgb);
    }
    changed
}
