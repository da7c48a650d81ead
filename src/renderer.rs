// renderer.rs — 核心渲染器：wgpu 设备、表面、天空盒、网格与 egui

use crate::baker::CubemapBaker;
use crate::camera::FirstPersonCamera;
use crate::error::{Result, ViewError};
use crate::grid::GridRenderer;
use crate::layout::{load_cubemap_direct, CubemapLayout};
use crate::panorama::{PanoramaImage, PanoramaTexture};
use crate::session::ReloadRequest;
use crate::skybox::{ProjectionUniforms, SkyboxPresenter};
use std::sync::Arc;
use winit::window::Window;

const GRID_SLICES: u32 = 10;
const GRID_SPACING: f32 = 1.0;

pub struct Renderer {
    surface: wgpu::Surface,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    pub size: winit::dpi::PhysicalSize<u32>,

    baker: CubemapBaker,
    skybox: SkyboxPresenter,
    grid: GridRenderer,

    // UI
    pub egui_ctx: egui::Context,
    pub egui_state: egui_winit::State,
    egui_renderer: egui_wgpu::Renderer,
}

impl Renderer {
    pub async fn new(window: Arc<Window>, flags: ProjectionUniforms, font_size: u32) -> Result<Self> {
        let size = window.inner_size();
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = unsafe { instance.create_surface(window.as_ref()) }
            .map_err(|e| ViewError::Device(format!("create surface: {}", e)))?;
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| ViewError::Device("no compatible GPU adapter".into()))?;
        log::info!("adapter: {:?}", adapter.get_info());

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    features: wgpu::Features::empty(),
                    limits: wgpu::Limits::default().using_resolution(adapter.limits()),
                    label: None,
                },
                None,
            )
            .await
            .map_err(|e| ViewError::Device(format!("request device: {}", e)))?;

        // 天空盒 shader 自行做伽马校正，表面必须是线性格式
        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| !f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| ViewError::Device("surface reports no formats".into()))?;
        if surface_format.is_srgb() {
            log::warn!("only sRGB surface formats available, gamma will be applied twice");
        }

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo, // VSync on
            alpha_mode: surface_caps.alpha_modes.first().copied().unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        let baker = CubemapBaker::new(&device);
        let skybox = SkyboxPresenter::new(&device, config.format, flags);
        let grid = GridRenderer::new(&device, config.format, GRID_SLICES, GRID_SPACING);

        let egui_ctx = egui::Context::default();
        crate::fonts::setup_egui_ui_fonts(&egui_ctx, font_size);

        // egui-winit 0.23：显式设置 pixels_per_point 以处理高 DPI 显示器
        let mut egui_state = egui_winit::State::new(window.as_ref());
        egui_state.set_pixels_per_point(window.scale_factor() as f32);

        let egui_renderer = egui_wgpu::Renderer::new(&device, config.format, None, 1);

        Ok(Self {
            surface,
            device,
            queue,
            config,
            size,
            baker,
            skybox,
            grid,
            egui_ctx,
            egui_state,
            egui_renderer,
        })
    }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.size = new_size;
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.device, &self.config);
        }
    }

    fn aspect(&self) -> f32 {
        self.config.width as f32 / self.config.height.max(1) as f32
    }

    pub fn update_camera(&mut self, camera: &FirstPersonCamera, fovy: f32) {
        let projection = camera.projection(fovy, self.aspect());
        self.skybox.update(&self.queue, projection, camera.rotation_view());
        self.grid.update(&self.queue, projection, camera.view());
    }

    pub fn set_projection_uniforms(&mut self, flags: ProjectionUniforms) {
        self.skybox.set_flags(&self.queue, flags);
    }

    /// Builds a cubemap for `image` as described by `request` and makes it
    /// the skybox environment. On error the previous environment stays.
    pub fn load_environment(&mut self, image: PanoramaImage, request: &ReloadRequest) -> Result<()> {
        let cubemap = if request.project_as_panorama {
            let image = image.fit_within(self.device.limits().max_texture_dimension_2d);
            let panorama = PanoramaTexture::upload(&self.device, &self.queue, &image)?;
            self.baker
                .bake(&self.device, &self.queue, &panorama, request.edge_length, panorama.format())?
        } else {
            load_cubemap_direct(&self.device, &self.queue, &image, CubemapLayout::Auto)?
        };

        log::info!(
            "environment {} ready: {}² {:?}",
            request.path.display(),
            cubemap.edge_length(),
            cubemap.format()
        );
        if let Some(previous) = self.skybox.install(&self.device, cubemap) {
            log::debug!("release previous cubemap ({}²)", previous.edge_length());
        }
        Ok(())
    }

    pub fn render_with_ui(
        &mut self,
        window: &Window,
        show_skybox: bool,
        show_grid: bool,
        run_ui: impl FnOnce(&egui::Context),
    ) -> std::result::Result<(), wgpu::SurfaceError> {
        let output = self.surface.get_current_texture()?;
        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Render Encoder"),
        });

        // 1. 场景：天空盒在底，网格叠加其上
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color { r: 0.1, g: 0.1, b: 0.1, a: 1.0 }),
                        store: true,
                    },
                })],
                depth_stencil_attachment: None,
            });

            if show_skybox {
                self.skybox.draw(&mut render_pass);
            }
            if show_grid {
                self.grid.draw(&mut render_pass);
            }
        }

        // 2. UI
        let raw_input = self.egui_state.take_egui_input(window);
        let full_output = self.egui_ctx.run(raw_input, run_ui);

        self.egui_state
            .handle_platform_output(window, &self.egui_ctx, full_output.platform_output);
        let clipped_primitives = self.egui_ctx.tessellate(full_output.shapes);

        let screen_descriptor = egui_wgpu::renderer::ScreenDescriptor {
            size_in_pixels: [self.config.width, self.config.height],
            pixels_per_point: window.scale_factor() as f32,
        };

        for (id, delta) in &full_output.textures_delta.set {
            self.egui_renderer.update_texture(&self.device, &self.queue, *id, delta);
        }

        self.egui_renderer.update_buffers(
            &self.device,
            &self.queue,
            &mut encoder,
            &clipped_primitives,
            &screen_descriptor,
        );

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Egui Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations { load: wgpu::LoadOp::Load, store: true },
                })],
                depth_stencil_attachment: None,
            });
            self.egui_renderer.render(&mut render_pass, &clipped_primitives, &screen_descriptor);
        }

        for id in &full_output.textures_delta.free {
            self.egui_renderer.free_texture(id);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }
}
