// fonts.rs — egui 界面字体：运行时搜索系统字体目录与 ./assets
//
// ab_glyph 对 .ttc 支持不稳定，优先 .ttf/.otf；解析失败的候选自动跳过。

use std::path::{Path, PathBuf};

const ASSET_FONTS: [&str; 5] = [
    "NotoSansCJK-Regular.ttc",
    "NotoSansSC-Regular.otf",
    "NotoSansSC-Regular.ttf",
    "NotoSans-Regular.ttf",
    "NotoSans-Regular.otf",
];

fn system_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    if cfg!(windows) {
        let win_fonts = PathBuf::from(r"C:\Windows\Fonts");
        for f in ["msyh.ttf", "msyhbd.ttf", "simhei.ttf", "simsun.ttf", "Deng.ttf", "arialuni.ttf"] {
            candidates.push(win_fonts.join(f));
        }
    } else if cfg!(target_os = "macos") {
        for f in [
            "/System/Library/Fonts/PingFang.ttc",
            "/System/Library/Fonts/STHeiti Light.ttc",
            "/System/Library/Fonts/Hiragino Sans GB.ttc",
            "/System/Library/Fonts/Supplemental/Arial Unicode.ttf",
            "/Library/Fonts/NotoSansSC-Regular.otf",
        ] {
            candidates.push(PathBuf::from(f));
        }
        if let Some(home) = std::env::var_os("HOME") {
            candidates.push(PathBuf::from(home).join("Library/Fonts/NotoSansSC-Regular.otf"));
        }
    } else if cfg!(unix) {
        for f in [
            "/usr/share/fonts/truetype/noto/NotoSansCJK-Regular.ttc",
            "/usr/share/fonts/opentype/noto/NotoSansCJK-Regular.ttc",
            "/usr/share/fonts/opentype/noto/NotoSansSC-Regular.otf",
            "/usr/share/fonts/noto-cjk/NotoSansCJK-Regular.ttc",
            "/usr/share/fonts/truetype/wqy/wqy-zenhei.ttc",
            "/usr/share/fonts/truetype/wqy/wqy-microhei.ttc",
        ] {
            candidates.push(PathBuf::from(f));
        }
        if let Some(home) = std::env::var_os("HOME") {
            let home = PathBuf::from(home);
            for f in [".local/share/fonts/NotoSansSC-Regular.ttf", ".fonts/NotoSansSC-Regular.ttf"] {
                candidates.push(home.join(f));
            }
        }
    }

    candidates
}

fn asset_candidates() -> Vec<PathBuf> {
    let mut roots = Vec::new();
    if let Some(dir) = std::env::current_exe().ok().and_then(|exe| exe.parent().map(Path::to_path_buf)) {
        roots.push(dir.join("assets"));
    }
    roots.push(PathBuf::from("assets"));

    roots
        .iter()
        .flat_map(|root| ASSET_FONTS.iter().map(move |f| root.join(f)))
        .collect()
}

fn try_load_font(path: &Path) -> Option<Vec<u8>> {
    let bytes = std::fs::read(path).ok()?;
    match ab_glyph::FontRef::try_from_slice(&bytes) {
        Ok(_) => Some(bytes),
        Err(_) => {
            log::debug!("skip unparsable font {}", path.display());
            None
        }
    }
}

/// Installs the first usable CJK font and scales the text styles to `font_size` points.
pub fn setup_egui_ui_fonts(ctx: &egui::Context, font_size: u32) {
    let chosen = system_candidates()
        .into_iter()
        .chain(asset_candidates())
        .find_map(|p| try_load_font(&p).map(|bytes| (p, bytes)));

    match chosen {
        Some((font_path, font_bytes)) => {
            log::info!(
                "{}",
                crate::i18n::tr_with("font.using", &[("path", font_path.display().to_string())])
            );

            let mut fonts = egui::FontDefinitions::default();
            fonts.font_data.insert("ui".to_owned(), egui::FontData::from_owned(font_bytes));
            for family in [egui::FontFamily::Proportional, egui::FontFamily::Monospace] {
                if let Some(list) = fonts.families.get_mut(&family) {
                    list.insert(0, "ui".to_owned());
                }
            }
            ctx.set_fonts(fonts);
        }
        None => log::warn!("{}", crate::i18n::tr("font.not_found")),
    }

    let body = font_size.max(8) as f32;
    let mut style = (*ctx.style()).clone();
    for (text_style, font_id) in style.text_styles.iter_mut() {
        font_id.size = match text_style {
            egui::TextStyle::Heading => body * 1.4,
            egui::TextStyle::Small => body * 0.8,
            _ => body,
        };
    }
    ctx.set_style(style);
}
