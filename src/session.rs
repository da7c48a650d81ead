// session.rs — 会话状态：配置、文件列表、当前索引与待处理的重新加载
// 由调用方持有并按引用传入 UI / 事件处理，不使用全局可变状态

use crate::config::Config;
use crate::skybox::ProjectionUniforms;
use std::path::{Path, PathBuf};

pub const IMAGE_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "hdr", "bmp", "tga"];

/// Bake edge lengths selectable with keys 1-4.
pub const TEXTURE_SIZES: [u32; 4] = [1024, 2048, 4096, 8192];

pub const ASPECT_RATIOS: [(f32, f32); 7] = [
    (16.0, 9.0),
    (17.0, 9.0),
    (18.0, 9.0),
    (18.5, 9.0),
    (19.0, 9.0),
    (19.5, 9.0),
    (19.0, 10.0),
];

pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.iter().any(|known| e.eq_ignore_ascii_case(known)))
        .unwrap_or(false)
}

fn list_directory(dir: &Path) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            log::warn!("read directory {}: {}", dir.display(), e);
            return Vec::new();
        }
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && is_supported_image(p))
        .collect();
    files.sort();
    files
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Playlist {
    files: Vec<PathBuf>,
    current: Option<usize>,
}

impl Playlist {
    /// Replaces the list with a drop of one file, one directory, or several
    /// files. Returns true when a new current file was selected.
    pub fn replace_with_dropped(&mut self, dropped: &[PathBuf]) -> bool {
        self.files = match dropped {
            [] => Vec::new(),
            [single] if single.is_dir() => list_directory(single),
            many => many.iter().filter(|p| is_supported_image(p)).cloned().collect(),
        };
        self.current = if self.files.is_empty() { None } else { Some(0) };
        self.current.is_some()
    }

    pub fn previous(&mut self) -> bool {
        match self.current {
            Some(i) if i > 0 => {
                self.current = Some(i - 1);
                true
            }
            _ => false,
        }
    }

    pub fn next(&mut self) -> bool {
        match self.current {
            Some(i) if i + 1 < self.files.len() => {
                self.current = Some(i + 1);
                true
            }
            _ => false,
        }
    }

    pub fn current_path(&self) -> Option<&Path> {
        self.current.map(|i| self.files[i].as_path())
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }
}

/// What the render thread needs to rebuild the skybox.
#[derive(Debug, Clone, PartialEq)]
pub struct ReloadRequest {
    pub generation: u64,
    pub path: PathBuf,
    pub edge_length: u32,
    pub project_as_panorama: bool,
}

pub struct Session {
    pub config: Config,
    pub playlist: Playlist,
    pub texture_size: u32,
    pub ratio_index: usize,
    pub fovy: f32,
    pub show_help: bool,
    /// Last load or bake error, shown in the info overlay.
    pub status: Option<String>,
    reload: bool,
    generation: u64,
}

impl Session {
    pub fn new(config: Config) -> Self {
        let fovy = config.clamp_fov(config.default_fov);
        Self {
            config,
            playlist: Playlist::default(),
            texture_size: TEXTURE_SIZES[0],
            ratio_index: 0,
            fovy,
            show_help: false,
            status: None,
            reload: false,
            generation: 0,
        }
    }

    fn request_reload(&mut self) {
        if self.playlist.current_path().is_some() {
            self.reload = true;
        }
    }

    pub fn drop_files(&mut self, dropped: &[PathBuf]) {
        if self.playlist.replace_with_dropped(dropped) {
            self.request_reload();
        } else {
            log::warn!("no supported images among {} dropped path(s)", dropped.len());
        }
    }

    pub fn previous_file(&mut self) {
        if self.playlist.previous() {
            self.request_reload();
        }
    }

    pub fn next_file(&mut self) {
        if self.playlist.next() {
            self.request_reload();
        }
    }

    pub fn select_texture_size(&mut self, size: u32) {
        if self.texture_size != size {
            self.texture_size = size;
            self.request_reload();
        }
    }

    pub fn projection_uniforms(&self) -> ProjectionUniforms {
        ProjectionUniforms {
            do_gamma: self.config.gamma_correct,
            vertically_flipped: self.config.flip_image,
        }
    }

    pub fn toggle_gamma(&mut self) -> ProjectionUniforms {
        self.config.gamma_correct = !self.config.gamma_correct;
        self.projection_uniforms()
    }

    pub fn toggle_flip(&mut self) -> ProjectionUniforms {
        self.config.flip_image = !self.config.flip_image;
        self.projection_uniforms()
    }

    pub fn toggle_panorama(&mut self) {
        self.config.need_gen_cube_map = !self.config.need_gen_cube_map;
        self.request_reload();
    }

    pub fn toggle_info(&mut self) {
        self.config.show_info = !self.config.show_info;
    }

    pub fn toggle_grid(&mut self) {
        self.config.show_grid = !self.config.show_grid;
    }

    pub fn aspect_ratio(&self) -> (f32, f32) {
        ASPECT_RATIOS[self.ratio_index]
    }

    /// Steps through the aspect ratio presets, wrapping at both ends, and
    /// returns the logical window size for the new preset.
    pub fn cycle_ratio(&mut self, step: isize) -> (f32, f32) {
        let n = ASPECT_RATIOS.len() as isize;
        self.ratio_index = (self.ratio_index as isize + step).rem_euclid(n) as usize;
        let (w, h) = self.aspect_ratio();
        (w * self.config.ratio_scale, h * self.config.ratio_scale)
    }

    pub fn zoom(&mut self, wheel: f32) {
        if wheel.abs() <= 0.1 {
            return;
        }
        let delta = if self.config.inverse_wheel { -wheel } else { wheel };
        self.fovy = self.config.clamp_fov(self.fovy + delta * self.config.step_fov);
    }

    /// The pending reload, if any. Each request gets a fresh generation so
    /// results of superseded requests can be recognised and dropped.
    pub fn take_reload(&mut self) -> Option<ReloadRequest> {
        if !std::mem::take(&mut self.reload) {
            return None;
        }
        let path = self.playlist.current_path()?.to_path_buf();
        self.generation += 1;
        Some(ReloadRequest {
            generation: self.generation,
            path,
            edge_length: self.texture_size,
            project_as_panorama: self.config.need_gen_cube_map,
        })
    }

    pub fn is_current(&self, generation: u64) -> bool {
        generation == self.generation
    }
}
