use crate::chat_api::ChatConfig;
use crate::render::{ImageItem, RenderedItem};
use crate::session::ChatSession;
use crate::transcript::{Message, Role};
use anyhow::{anyhow, Result};
use eframe::egui::{self, Align, Button, Color32, Frame, Layout, RichText, ScrollArea, Stroke};
use image::imageops::FilterType;
use image::DynamicImage;
use std::collections::HashMap;
use std::time::Duration;

const WINDOW_TITLE: &str = "AI Assistant";
const WINDOW_BG: Color32 = Color32::from_rgb(0x20, 0x21, 0x23);
const USER_BUBBLE: Color32 = Color32::from_rgb(0x34, 0x35, 0x41);
const ASSISTANT_BUBBLE: Color32 = Color32::from_rgb(0x44, 0x46, 0x54);
const INPUT_BG: Color32 = Color32::from_rgb(0x40, 0x41, 0x4f);
const BORDER: Color32 = Color32::from_rgb(0x56, 0x58, 0x69);
const SEND_GREEN: Color32 = Color32::from_rgb(0x19, 0xc3, 0x7d);
const TEXT: Color32 = Color32::WHITE;
const INPUT_MAX_HEIGHT: f32 = 100.0;
const PENDING_REPAINT: Duration = Duration::from_millis(50);

pub fn run_gui(config: ChatConfig) -> Result<()> {
    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1000.0, 800.0])
            .with_min_inner_size([480.0, 360.0])
            .with_title(WINDOW_TITLE),
        ..Default::default()
    };

    eframe::run_native(
        WINDOW_TITLE,
        native_options,
        Box::new(move |cc| {
            configure_theme(&cc.egui_ctx);
            Ok(Box::new(AssistantApp::new(config.clone())))
        }),
    )
    .map_err(|err| anyhow!("could not start the window: {err}"))
}

fn configure_theme(ctx: &egui::Context) {
    let mut style = (*ctx.style()).clone();
    style.visuals = egui::Visuals::dark();
    style.visuals.override_text_color = Some(TEXT);
    style.visuals.panel_fill = WINDOW_BG;
    style.visuals.window_fill = WINDOW_BG;
    style.visuals.extreme_bg_color = INPUT_BG;
    style.visuals.widgets.inactive.bg_stroke = Stroke::new(1.0, BORDER);
    style.visuals.widgets.hovered.bg_stroke = Stroke::new(1.0, BORDER);
    style.spacing.item_spacing = egui::vec2(8.0, 8.0);
    style.spacing.button_padding = egui::vec2(20.0, 10.0);
    style
        .text_styles
        .insert(egui::TextStyle::Body, egui::FontId::proportional(14.0));
    style
        .text_styles
        .insert(egui::TextStyle::Button, egui::FontId::proportional(14.0));
    ctx.set_style(style);
}

pub struct AssistantApp {
    session: ChatSession,
    input: String,
    textures: HashMap<usize, egui::TextureHandle>,
}

impl AssistantApp {
    fn new(config: ChatConfig) -> Self {
        Self {
            session: ChatSession::new(config),
            input: String::new(),
            textures: HashMap::new(),
        }
    }

    fn send_prompt(&mut self) {
        if self.session.submit(&self.input).is_some() {
            self.input.clear();
        }
    }

    fn render_message(
        ui: &mut egui::Ui,
        message: &Message,
        texture: Option<&egui::TextureHandle>,
    ) -> egui::Rect {
        let (fill, is_user) = match message.role {
            Role::User => (USER_BUBBLE, true),
            Role::Assistant => (ASSISTANT_BUBBLE, false),
        };
        let max_bubble_width = (ui.available_width() * 0.82).clamp(220.0, 760.0);
        let row_layout = if is_user {
            Layout::right_to_left(Align::TOP)
        } else {
            Layout::left_to_right(Align::TOP)
        };

        let mut bubble_rect = egui::Rect::NOTHING;
        ui.horizontal(|ui| {
            ui.set_width(ui.available_width());
            ui.with_layout(row_layout, |ui| {
                bubble_rect = ui
                    .scope(|ui| {
                        ui.set_max_width(max_bubble_width);
                        Frame::default()
                            .fill(fill)
                            .corner_radius(egui::CornerRadius::same(15))
                            .inner_margin(egui::Margin::symmetric(15, 10))
                            .show(ui, |ui| match (&message.content, texture) {
                                (RenderedItem::Text(text), _) => {
                                    ui.add(
                                        egui::Label::new(
                                            RichText::new(text.as_str()).color(TEXT).size(14.0),
                                        )
                                        .wrap(),
                                    );
                                }
                                (RenderedItem::Image(image), Some(texture)) => {
                                    let [width, height] = image.display_size();
                                    let shown_width = width.min(ui.available_width());
                                    let size = egui::vec2(shown_width, height * shown_width / width);
                                    ui.vertical_centered(|ui| {
                                        ui.add(egui::Image::new((texture.id(), size)));
                                    });
                                }
                                (RenderedItem::Image(_), None) => {
                                    ui.label(RichText::new("[image]").italics());
                                }
                            })
                            .response
                            .rect
                    })
                    .inner;
            });
        });

        bubble_rect
    }
}

fn status_text(pending: usize) -> String {
    match pending {
        0 => "Ready".to_string(),
        1 => "Waiting for reply...".to_string(),
        n => format!("Waiting for {n} replies..."),
    }
}

fn ensure_texture(
    textures: &mut HashMap<usize, egui::TextureHandle>,
    ctx: &egui::Context,
    index: usize,
    image: &ImageItem,
) -> egui::TextureHandle {
    textures
        .entry(index)
        .or_insert_with(|| {
            let max_side = ctx.input(|i| i.max_texture_side) as u32;
            let pixels = image.pixels();
            let fitted;
            let pixels = if pixels.width() > max_side || pixels.height() > max_side {
                fitted = DynamicImage::ImageRgba8(pixels.clone())
                    .resize(max_side, max_side, FilterType::Triangle)
                    .to_rgba8();
                &fitted
            } else {
                pixels
            };
            let color_image = egui::ColorImage::from_rgba_unmultiplied(
                [pixels.width() as usize, pixels.height() as usize],
                pixels.as_raw(),
            );
            ctx.load_texture(
                format!("reply_image_{index}"),
                color_image,
                egui::TextureOptions::LINEAR,
            )
        })
        .clone()
}

impl eframe::App for AssistantApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.session.poll_completions();

        // Consumed here so the multiline editor does not also insert a newline.
        if ctx.input_mut(|i| i.consume_key(egui::Modifiers::CTRL, egui::Key::Enter)) {
            self.send_prompt();
        }

        egui::TopBottomPanel::bottom("input_bar")
            .resizable(false)
            .frame(
                Frame::default()
                    .fill(WINDOW_BG)
                    .inner_margin(egui::Margin::same(10)),
            )
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    let send_width = 100.0;
                    let input_width = (ui.available_width() - send_width - 16.0).max(120.0);
                    Frame::default()
                        .fill(INPUT_BG)
                        .stroke(Stroke::new(1.0, BORDER))
                        .corner_radius(egui::CornerRadius::same(10))
                        .inner_margin(egui::Margin::same(10))
                        .show(ui, |ui| {
                            ScrollArea::vertical()
                                .id_salt("input_scroll")
                                .max_height(INPUT_MAX_HEIGHT)
                                .show(ui, |ui| {
                                    ui.add_sized(
                                        [input_width - 20.0, 48.0],
                                        egui::TextEdit::multiline(&mut self.input)
                                            .hint_text("Type your message here...")
                                            .frame(false)
                                            .desired_rows(2),
                                    );
                                });
                        });

                    if ui
                        .add(
                            Button::new(RichText::new("Send").color(TEXT))
                                .min_size(egui::vec2(send_width, 40.0))
                                .fill(SEND_GREEN)
                                .corner_radius(egui::CornerRadius::same(10)),
                        )
                        .clicked()
                    {
                        self.send_prompt();
                    }
                });
                ui.horizontal(|ui| {
                    let status = status_text(self.session.pending_requests());
                    ui.label(RichText::new(status).small());
                    ui.separator();
                    ui.label(RichText::new(self.session.endpoint()).small());
                    ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                        ui.label(RichText::new("Ctrl+Enter to send").small());
                    });
                });
            });

        egui::CentralPanel::default()
            .frame(
                Frame::default()
                    .fill(WINDOW_BG)
                    .inner_margin(egui::Margin::same(10)),
            )
            .show(ctx, |ui| {
                let scroll_to_latest = self.session.transcript_mut().take_scroll_request();
                ScrollArea::vertical()
                    .id_salt("conversation_scroll")
                    .stick_to_bottom(true)
                    .auto_shrink([false, false])
                    .show(ui, |ui| {
                        let mut last_rect = None;
                        let messages = self.session.transcript().messages();
                        for (index, message) in messages.iter().enumerate() {
                            let texture = match &message.content {
                                RenderedItem::Image(image) => {
                                    Some(ensure_texture(&mut self.textures, ctx, index, image))
                                }
                                RenderedItem::Text(_) => None,
                            };
                            last_rect = Some(Self::render_message(ui, message, texture.as_ref()));
                            ui.add_space(6.0);
                        }
                        if let Some(rect) = last_rect.filter(|_| scroll_to_latest) {
                            ui.scroll_to_rect(rect, Some(Align::BOTTOM));
                        }
                    });
            });

        if self.session.pending_requests() > 0 {
            ctx.request_repaint_after(PENDING_REPAINT);
        }
    }
}
