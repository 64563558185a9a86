use crate::app::AmvConverterApp;
use crate::constants::{REPAINT_INTERVAL_MS, WINDOW_TITLE};
use crate::conversion::{display_name, JobState};
use crate::events::LogLevel;
use eframe::egui;
use std::time::Duration;

impl eframe::App for AmvConverterApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.update_status();

        let mut style = (*ctx.style()).clone();
        style.spacing.button_padding = egui::vec2(12.0, 6.0);
        style.spacing.item_spacing = egui::vec2(8.0, 8.0);
        ctx.set_style(style);
        ctx.set_visuals(egui::Visuals::dark());

        if ctx.input(|i| i.viewport().close_requested()) && !self.request_close() {
            ctx.send_viewport_cmd(egui::ViewportCommand::CancelClose);
        }

        egui::TopBottomPanel::top("header")
            .frame(egui::Frame::none().fill(egui::Color32::from_gray(15)).inner_margin(12.0))
            .show(ctx, |ui| {
                ui.vertical_centered(|ui| {
                    ui.heading(
                        egui::RichText::new(format!("🎬 {}", WINDOW_TITLE))
                            .size(20.0)
                            .color(egui::Color32::WHITE)
                            .strong(),
                    );
                    ui.label(
                        egui::RichText::new(&self.view.status)
                            .size(12.0)
                            .color(egui::Color32::LIGHT_BLUE),
                    );
                });
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            if let Some(warning) = &self.transcoder_warning {
                egui::Frame::none()
                    .fill(egui::Color32::from_rgba_premultiplied(200, 120, 0, 40))
                    .rounding(6.0)
                    .inner_margin(8.0)
                    .show(ui, |ui| {
                        ui.label(egui::RichText::new(format!("⚠ {}", warning)).color(egui::Color32::YELLOW));
                    });
                ui.add_space(6.0);
            }

            self.show_controls(ui);
            ui.add_space(8.0);
            self.show_progress(ui);
            ui.add_space(8.0);
            self.show_log(ui);
        });

        self.show_summary_window(ctx);
        self.show_notice_window(ctx);
        self.show_close_confirmation(ctx);

        if self.is_converting() {
            ctx.request_repaint_after(Duration::from_millis(REPAINT_INTERVAL_MS));
        }
    }
}

impl AmvConverterApp {
    fn show_controls(&mut self, ui: &mut egui::Ui) {
        let converting = self.is_converting();

        ui.vertical_centered(|ui| {
            let select_button = egui::Button::new(egui::RichText::new("📁 Select video files").size(14.0))
                .min_size(egui::vec2(200.0, 32.0));
            if ui.add_enabled(!converting, select_button).clicked() {
                self.select_files();
            }

            ui.horizontal(|ui| {
                ui.label("Selected files:");
                ui.label(
                    egui::RichText::new(self.selected_files.len().to_string())
                        .color(egui::Color32::LIGHT_BLUE)
                        .strong(),
                );
            });

            let start_button = egui::Button::new(
                egui::RichText::new("▶ Start conversion")
                    .size(14.0)
                    .color(egui::Color32::WHITE)
                    .strong(),
            )
            .fill(egui::Color32::from_rgb(76, 175, 80))
            .min_size(egui::vec2(200.0, 32.0));
            if ui.add_enabled(self.can_start(), start_button).clicked() {
                self.start_conversion();
            }
        });

        if !self.selected_files.is_empty() {
            ui.collapsing("Files", |ui| {
                let states_match = self.view.job_states.len() == self.selected_files.len();
                for (index, path) in self.selected_files.iter().enumerate() {
                    let marker = if states_match {
                        job_marker(&self.view.job_states[index])
                    } else {
                        "•"
                    };
                    ui.label(format!("{} {}", marker, display_name(path)));
                }
            });
        }
    }

    fn show_progress(&mut self, ui: &mut egui::Ui) {
        egui::Frame::none()
            .fill(egui::Color32::from_gray(30))
            .stroke(egui::Stroke::new(1.0, egui::Color32::from_gray(45)))
            .rounding(8.0)
            .inner_margin(12.0)
            .show(ui, |ui| {
                ui.label(egui::RichText::new("Total progress:").strong());
                let progress = self.view.progress;
                ui.add(
                    egui::ProgressBar::new(progress.fraction())
                        .text(format!("{:.1}%", progress.percentage()))
                        .desired_width(ui.available_width()),
                );

                ui.add_space(6.0);
                ui.label(egui::RichText::new("Current file:").strong());
                ui.horizontal(|ui| {
                    if self.view.file_in_progress {
                        ui.add(egui::Spinner::new().size(14.0));
                    }
                    match &self.view.current_file {
                        Some(name) => ui.label(egui::RichText::new(name).color(egui::Color32::LIGHT_BLUE)),
                        None => ui.label(egui::RichText::new("None").color(egui::Color32::GRAY)),
                    };
                });
            });
    }

    fn show_log(&mut self, ui: &mut egui::Ui) {
        ui.label(egui::RichText::new("Conversion log:").strong());
        egui::Frame::none()
            .fill(egui::Color32::from_gray(20))
            .rounding(6.0)
            .inner_margin(8.0)
            .show(ui, |ui| {
                egui::ScrollArea::vertical()
                    .stick_to_bottom(true)
                    .auto_shrink([false; 2])
                    .show(ui, |ui| {
                        for line in &self.view.log {
                            let color = match line.level {
                                LogLevel::Info => egui::Color32::LIGHT_GRAY,
                                LogLevel::Success => egui::Color32::LIGHT_GREEN,
                                LogLevel::Warning => egui::Color32::YELLOW,
                                LogLevel::Error => egui::Color32::LIGHT_RED,
                            };
                            ui.label(egui::RichText::new(&line.message).monospace().size(11.0).color(color));
                        }
                    });
            });
    }

    fn show_summary_window(&mut self, ctx: &egui::Context) {
        let Some(summary) = self.view.summary else {
            return;
        };

        let mut dismissed = false;
        egui::Window::new(summary.title())
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label(format!("Video conversion {}!", summary.title().to_lowercase()));
                ui.add_space(6.0);
                ui.label(egui::RichText::new(format!("✅ Succeeded: {}", summary.succeeded)).color(egui::Color32::LIGHT_GREEN));
                ui.label(egui::RichText::new(format!("❌ Failed: {}", summary.failed)).color(egui::Color32::LIGHT_RED));
                ui.add_space(6.0);
                ui.vertical_centered(|ui| {
                    if ui.button("OK").clicked() {
                        dismissed = true;
                    }
                });
            });

        if dismissed {
            self.view.dismiss_summary();
        }
    }

    fn show_notice_window(&mut self, ctx: &egui::Context) {
        let Some(notice) = self.notice.clone() else {
            return;
        };

        let mut dismissed = false;
        egui::Window::new("Notice")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label(notice);
                ui.vertical_centered(|ui| {
                    if ui.button("OK").clicked() {
                        dismissed = true;
                    }
                });
            });

        if dismissed {
            self.notice = None;
        }
    }

    fn show_close_confirmation(&mut self, ctx: &egui::Context) {
        if !self.show_close_confirmation {
            return;
        }

        let mut close = false;
        let mut keep_open = false;
        egui::Window::new("Confirm")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label("A conversion is in progress. Close anyway?");
                ui.horizontal(|ui| {
                    if ui.button("Yes").clicked() {
                        close = true;
                    }
                    if ui.button("No").clicked() {
                        keep_open = true;
                    }
                });
            });

        if close {
            self.confirm_close();
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
        } else if keep_open {
            self.show_close_confirmation = false;
        }
    }
}

fn job_marker(state: &JobState) -> &'static str {
    match state {
        JobState::Pending => "•",
        JobState::Running => "⏳",
        JobState::Succeeded => "✅",
        JobState::Failed(_) => "❌",
        JobState::Cancelled => "⏹",
    }
}
