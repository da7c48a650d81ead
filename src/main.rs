// main.rs — 全景图观察者：窗口、事件循环、后台解码与叠加层 UI

#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")] // 在 Release 模式下隐藏控制台窗口

use view360::camera::{FirstPersonCamera, MOVE_SPEED};
use view360::config::{self, Config};
use view360::i18n::{self, tr, tr_with};
use view360::input::KeyLatch;
use view360::panorama::PanoramaImage;
use view360::renderer::Renderer;
use view360::session::{ReloadRequest, Session, IMAGE_EXTENSIONS, TEXTURE_SIZES};

use std::path::PathBuf;
use std::sync::mpsc::{channel, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use winit::{
    dpi::{LogicalSize, PhysicalPosition},
    event::*,
    event_loop::{ControlFlow, EventLoop},
    window::{Fullscreen, WindowBuilder},
};

const HELP_KEYS: [&str; 17] = [
    "help.key.esc",
    "help.key.f",
    "help.key.f11",
    "help.key.c",
    "help.key.l",
    "help.key.p",
    "help.key.i",
    "help.key.g",
    "help.key.help",
    "help.key.ratio",
    "help.key.nav",
    "help.key.size",
    "help.key.open",
    "help.mouse.drag",
    "help.mouse.walk",
    "help.mouse.wheel",
    "help.drop",
];

/// Result of a background decode, tagged with the request that started it.
struct LoadedImage {
    request: ReloadRequest,
    image: view360::Result<PanoramaImage>,
}

fn main() {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if cfg!(debug_assertions) { "info" } else { "warn" }),
    )
    .init();

    i18n::init(i18n::resolve_lang_from_args());

    let config_path = config::resolve_config_path();
    let mut session = Session::new(Config::load_or_default(&config_path));
    log::info!("config: {}", config_path.display());

    let event_loop = EventLoop::new();
    let (win_w, win_h) = session.cycle_ratio(0);
    let window = match WindowBuilder::new()
        .with_title(tr("app.title"))
        .with_inner_size(LogicalSize::new(win_w, win_h))
        .build(&event_loop)
    {
        Ok(w) => Arc::new(w),
        Err(e) => {
            log::error!("create window: {}", e);
            return;
        }
    };

    let mut renderer = match pollster::block_on(Renderer::new(
        window.clone(),
        session.projection_uniforms(),
        session.config.font_size,
    )) {
        Ok(r) => r,
        Err(e) => {
            log::error!("{}", e);
            return;
        }
    };
    let mut camera = FirstPersonCamera::new();

    // 交互状态
    let mut mouse_pressed = false;
    let mut last_mouse_pos: Option<PhysicalPosition<f64>> = None;
    let mut held_keys: KeyLatch<VirtualKeyCode> = KeyLatch::new();
    let mut last_frame = Instant::now();
    let mut pending_drops: Vec<PathBuf> = Vec::new();
    let mut is_loading = false;

    // 异步加载通道
    let (tx, rx) = channel::<LoadedImage>();

    event_loop.run(move |event, _, control_flow| {
        *control_flow = ControlFlow::Poll;

        if let Ok(loaded) = rx.try_recv() {
            if session.is_current(loaded.request.generation) {
                is_loading = false;
                let result = loaded
                    .image
                    .and_then(|image| renderer.load_environment(image, &loaded.request));
                session.status = match result {
                    Ok(()) => None,
                    Err(e) => {
                        log::error!("{}: {}", loaded.request.path.display(), e);
                        Some(e.to_string())
                    }
                };
            } else {
                log::debug!("discard stale decode of {}", loaded.request.path.display());
            }
        }

        match event {
            Event::WindowEvent { event, .. } => {
                // 先让 egui 处理事件
                let response = renderer.egui_state.on_event(&renderer.egui_ctx, &event);
                if response.consumed {
                    return;
                }

                match event {
                    WindowEvent::CloseRequested => {
                        *control_flow = ControlFlow::Exit;
                    }

                    // 失去焦点后收不到 Released
                    WindowEvent::Focused(false) => {
                        held_keys.clear();
                        mouse_pressed = false;
                        last_mouse_pos = None;
                    }

                    WindowEvent::Resized(new_size) => {
                        renderer.resize(new_size);
                    }

                    WindowEvent::ScaleFactorChanged { new_inner_size, .. } => {
                        renderer.resize(*new_inner_size);
                    }

                    WindowEvent::KeyboardInput { input, .. } => {
                        let Some(key) = input.virtual_keycode else {
                            return;
                        };
                        if input.state == ElementState::Released {
                            held_keys.release(key);
                            if matches!(key, VirtualKeyCode::F1 | VirtualKeyCode::H) {
                                session.show_help = false;
                            }
                            return;
                        }
                        // 按住不放时系统会重复发送 Pressed，只响应第一次
                        if !held_keys.press(key) {
                            return;
                        }

                        match key {
                            VirtualKeyCode::Escape => *control_flow = ControlFlow::Exit,
                            VirtualKeyCode::F => window.set_maximized(!window.is_maximized()),
                            VirtualKeyCode::F11 => {
                                if window.fullscreen().is_some() {
                                    window.set_fullscreen(None);
                                } else {
                                    window.set_fullscreen(Some(Fullscreen::Borderless(None)));
                                }
                            }
                            VirtualKeyCode::C => renderer.set_projection_uniforms(session.toggle_gamma()),
                            VirtualKeyCode::L => renderer.set_projection_uniforms(session.toggle_flip()),
                            VirtualKeyCode::P => session.toggle_panorama(),
                            VirtualKeyCode::I => session.toggle_info(),
                            VirtualKeyCode::G => session.toggle_grid(),
                            VirtualKeyCode::F1 | VirtualKeyCode::H => session.show_help = true,
                            VirtualKeyCode::Left | VirtualKeyCode::Right => {
                                let step = if key == VirtualKeyCode::Left { -1 } else { 1 };
                                let (w, h) = session.cycle_ratio(step);
                                window.set_inner_size(LogicalSize::new(w, h));
                            }
                            VirtualKeyCode::Up => session.previous_file(),
                            VirtualKeyCode::Down => session.next_file(),
                            VirtualKeyCode::Key1 => session.select_texture_size(TEXTURE_SIZES[0]),
                            VirtualKeyCode::Key2 => session.select_texture_size(TEXTURE_SIZES[1]),
                            VirtualKeyCode::Key3 => session.select_texture_size(TEXTURE_SIZES[2]),
                            VirtualKeyCode::Key4 => session.select_texture_size(TEXTURE_SIZES[3]),
                            VirtualKeyCode::O => {
                                if let Some(path) = rfd::FileDialog::new()
                                    .add_filter(&tr("file.filter.images"), &IMAGE_EXTENSIONS[..])
                                    .pick_file()
                                {
                                    session.drop_files(&[path]);
                                }
                                // 对话框会吞掉 Released 事件
                                held_keys.clear();
                            }
                            _ => {}
                        }
                    }

                    // 鼠标交互
                    WindowEvent::MouseInput { state, button, .. } => {
                        if button == MouseButton::Left {
                            mouse_pressed = state == ElementState::Pressed;
                            if !mouse_pressed {
                                last_mouse_pos = None;
                            }
                        }
                    }

                    WindowEvent::CursorMoved { position, .. } => {
                        if mouse_pressed {
                            if let Some(last_pos) = last_mouse_pos {
                                let dx = (position.x - last_pos.x) as f32;
                                let dy = (position.y - last_pos.y) as f32;
                                let viewport = (renderer.size.width as f32, renderer.size.height as f32);
                                camera.drag(dx, dy, viewport, session.fovy, 1.0);
                            }
                            last_mouse_pos = Some(position);
                        }
                    }

                    WindowEvent::MouseWheel { delta, .. } => {
                        let scroll = match delta {
                            MouseScrollDelta::LineDelta(_, y) => y,
                            MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 20.0,
                        };
                        session.zoom(scroll);
                    }

                    // 同一批拖入的多个文件在 MainEventsCleared 中一并处理
                    WindowEvent::DroppedFile(path) => {
                        pending_drops.push(path);
                    }

                    _ => {}
                }
            }

            Event::MainEventsCleared => {
                if !pending_drops.is_empty() {
                    session.drop_files(&std::mem::take(&mut pending_drops));
                    if session.playlist.current_path().is_none() {
                        session.status = Some(tr("error.no_images"));
                    }
                }

                if let Some(request) = session.take_reload() {
                    is_loading = true;
                    start_load_image(request, tx.clone());
                }

                window.request_redraw();
            }

            Event::RedrawRequested(_) => {
                let now = Instant::now();
                let dt = (now - last_frame).as_secs_f32();
                last_frame = now;

                // 与拖动一样，只有按住左键时 WASD 才移动视点
                if mouse_pressed {
                    let forward = held_keys.axis(VirtualKeyCode::W, VirtualKeyCode::S);
                    let right = held_keys.axis(VirtualKeyCode::D, VirtualKeyCode::A);
                    camera.walk(forward, right, MOVE_SPEED * dt);
                }
                renderer.update_camera(&camera, session.fovy);

                let show_skybox = session.playlist.current_path().is_some();
                let show_grid = session.config.show_grid;
                let render_result = renderer.render_with_ui(&window, show_skybox, show_grid, |ctx| {
                    draw_ui(ctx, &session, is_loading);
                });

                match render_result {
                    Ok(_) => {}
                    Err(wgpu::SurfaceError::Lost) => renderer.resize(renderer.size),
                    Err(wgpu::SurfaceError::OutOfMemory) => *control_flow = ControlFlow::Exit,
                    Err(e) => log::warn!("render error: {:?}", e),
                }
            }

            Event::LoopDestroyed => {
                if let Err(e) = session.config.save(&config_path) {
                    log::error!("save config {}: {}", config_path.display(), e);
                }
            }

            _ => {}
        }
    });
}

fn start_load_image(request: ReloadRequest, tx: Sender<LoadedImage>) {
    thread::spawn(move || {
        log::info!("decoding {} in background", request.path.display());
        let image = PanoramaImage::open(&request.path);
        if let Ok(image) = &image {
            let (w, h) = image.dimensions();
            log::info!("decoded {}x{} {:?}", w, h, image.pixel_format());
        }
        if tx.send(LoadedImage { request, image }).is_err() {
            log::warn!("event loop gone, dropping decoded image");
        }
    });
}

fn on_off(value: bool) -> String {
    tr(if value { "value.on" } else { "value.off" })
}

fn draw_ui(ctx: &egui::Context, session: &Session, is_loading: bool) {
    let panel = egui::Frame::none()
        .fill(egui::Color32::from_black_alpha(160))
        .inner_margin(6.0)
        .rounding(4.0);

    if session.config.show_info {
        egui::Area::new("info_panel")
            .anchor(egui::Align2::LEFT_TOP, [8.0, 8.0])
            .show(ctx, |ui| {
                panel.show(ui, |ui| {
                    match session.playlist.current_path() {
                        Some(path) => {
                            let name = path
                                .file_name()
                                .map(|n| n.to_string_lossy().into_owned())
                                .unwrap_or_default();
                            let index = session.playlist.current_index().map_or(0, |i| i + 1);
                            ui.label(tr_with(
                                "info.file",
                                &[
                                    ("name", name),
                                    ("index", index.to_string()),
                                    ("count", session.playlist.len().to_string()),
                                ],
                            ));
                        }
                        None => {
                            ui.label(tr("info.no_file"));
                        }
                    }

                    let (rw, rh) = session.aspect_ratio();
                    ui.label(tr_with("info.gamma", &[("value", on_off(session.config.gamma_correct))]));
                    ui.label(tr_with("info.flip", &[("value", on_off(session.config.flip_image))]));
                    ui.label(tr_with(
                        "info.panorama",
                        &[("value", on_off(session.config.need_gen_cube_map))],
                    ));
                    ui.label(tr_with("info.ratio", &[("w", rw.to_string()), ("h", rh.to_string())]));
                    ui.label(tr_with("info.fovy", &[("fovy", format!("{:.1}", session.fovy))]));
                    ui.label(tr_with("info.size", &[("size", session.texture_size.to_string())]));

                    if is_loading {
                        ui.label(egui::RichText::new(tr("info.loading")).color(egui::Color32::YELLOW));
                    }
                    if let Some(err) = &session.status {
                        ui.label(
                            egui::RichText::new(tr_with("info.error", &[("err", err.clone())]))
                                .color(egui::Color32::LIGHT_RED),
                        );
                    }
                });
            });
    }

    egui::Area::new("help_tip")
        .anchor(egui::Align2::LEFT_BOTTOM, [8.0, -8.0])
        .show(ctx, |ui| {
            panel.show(ui, |ui| {
                ui.label(egui::RichText::new(tr("tip.label")).strong())
                    .on_hover_text(tr("tip.hover"));
            });
        });

    if session.show_help {
        egui::Window::new(tr("help.title"))
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .collapsible(false)
            .resizable(false)
            .show(ctx, |ui| {
                for key in HELP_KEYS {
                    ui.label(tr(key));
                }
                ui.separator();
                let mode = tr(if cfg!(debug_assertions) { "build.debug" } else { "build.release" });
                ui.label(tr_with(
                    "help.version",
                    &[
                        ("version", env!("CARGO_PKG_VERSION").to_string()),
                        ("mode", mode),
                        ("date", option_env!("VIEW360_BUILD_DATE").unwrap_or("-").to_string()),
                    ],
                ));
            });
    }
}
