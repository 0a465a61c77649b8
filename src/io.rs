use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{DynamicImage, ImageEncoder, ImageError, RgbaImage};
use rfd::FileDialog;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::mpsc;

/// Extensions the open dialog offers. Decoding is left to the `image` crate.
pub const OPEN_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "webp", "bmp", "tga", "gif", "ico", "tiff", "tif",
];

/// Output formats for the warped image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SaveFormat {
    #[default]
    Png,
    Jpeg,
    Bmp,
    Tga,
    Tiff,
}

impl SaveFormat {
    pub const ALL: [SaveFormat; 5] = [
        SaveFormat::Png,
        SaveFormat::Jpeg,
        SaveFormat::Bmp,
        SaveFormat::Tga,
        SaveFormat::Tiff,
    ];

    pub fn extension(&self) -> &'static str {
        match self {
            SaveFormat::Png => "png",
            SaveFormat::Jpeg => "jpg",
            SaveFormat::Bmp => "bmp",
            SaveFormat::Tga => "tga",
            SaveFormat::Tiff => "tiff",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SaveFormat::Png => "PNG",
            SaveFormat::Jpeg => "JPEG",
            SaveFormat::Bmp => "BMP",
            SaveFormat::Tga => "TGA",
            SaveFormat::Tiff => "TIFF",
        }
    }

    /// Parse a `--format` style name. Unknown names are `None`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "png" => Some(SaveFormat::Png),
            "jpg" | "jpeg" => Some(SaveFormat::Jpeg),
            "bmp" => Some(SaveFormat::Bmp),
            "tga" => Some(SaveFormat::Tga),
            "tif" | "tiff" => Some(SaveFormat::Tiff),
            _ => None,
        }
    }

    /// Infer from a path's extension, defaulting to PNG.
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_name)
            .unwrap_or(SaveFormat::Png)
    }
}

/// Decode an image file to RGBA. No validation beyond what the decoder does.
pub fn load_image_sync(path: &Path) -> Result<RgbaImage, String> {
    image::open(path)
        .map(|img| img.to_rgba8())
        .map_err(|e| format!("{}: {}", path.display(), e))
}

pub fn encode_and_write(
    image: &RgbaImage,
    path: &Path,
    format: SaveFormat,
    quality: u8,
) -> Result<(), ImageError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    match format {
        SaveFormat::Png => {
            PngEncoder::new(&mut writer).write_image(
                image.as_raw(),
                image.width(),
                image.height(),
                image::ColorType::Rgba8,
            )?;
        }
        SaveFormat::Jpeg => {
            // JPEG has no alpha channel
            let rgb_image = DynamicImage::ImageRgba8(image.clone()).to_rgb8();
            let mut encoder = JpegEncoder::new_with_quality(&mut writer, quality.clamp(1, 100));
            encoder.encode(
                rgb_image.as_raw(),
                rgb_image.width(),
                rgb_image.height(),
                image::ColorType::Rgb8,
            )?;
        }
        SaveFormat::Bmp => {
            DynamicImage::ImageRgba8(image.clone()).write_to(&mut writer, image::ImageOutputFormat::Bmp)?;
        }
        SaveFormat::Tga => {
            DynamicImage::ImageRgba8(image.clone()).write_to(&mut writer, image::ImageOutputFormat::Tga)?;
        }
        SaveFormat::Tiff => {
            DynamicImage::ImageRgba8(image.clone()).write_to(&mut writer, image::ImageOutputFormat::Tiff)?;
        }
    }
    Ok(())
}

/// Result delivered from a background IO thread.
pub enum IoResult {
    /// Decoded successfully. `generation` is the load token the request was issued with.
    ImageLoaded {
        generation: u64,
        image: RgbaImage,
        path: PathBuf,
    },
    LoadFailed {
        generation: u64,
        path: PathBuf,
        error: String,
    },
    SaveComplete { path: PathBuf },
    SaveFailed { path: PathBuf, error: String },
}

/// Decode `path` on a worker thread and report back on `sender`.
pub fn spawn_load(path: PathBuf, generation: u64, sender: mpsc::Sender<IoResult>) {
    std::thread::spawn(move || {
        let msg = match load_image_sync(&path) {
            Ok(image) => IoResult::ImageLoaded { generation, image, path },
            Err(error) => IoResult::LoadFailed { generation, path, error },
        };
        let _ = sender.send(msg);
    });
}

/// Encode and write on a worker thread so large TIFF/PNG saves don't stall the UI.
pub fn spawn_save(image: RgbaImage, path: PathBuf, quality: u8, sender: mpsc::Sender<IoResult>) {
    std::thread::spawn(move || {
        let format = SaveFormat::from_path(&path);
        let msg = match encode_and_write(&image, &path, format, quality) {
            Ok(()) => IoResult::SaveComplete { path },
            Err(e) => IoResult::SaveFailed { path, error: e.to_string() },
        };
        let _ = sender.send(msg);
    });
}

pub fn pick_open_path() -> Option<PathBuf> {
    FileDialog::new()
        .add_filter("Images", OPEN_EXTENSIONS)
        .add_filter("All Files", &["*"])
        .pick_file()
}

/// Save dialog; the suggested name keeps the source stem with a `_warped` suffix.
pub fn pick_save_path(source: Option<&Path>) -> Option<PathBuf> {
    let stem = source
        .and_then(|p| p.file_stem())
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    let mut dialog = FileDialog::new().set_file_name(format!("{}_warped.png", stem));
    for fmt in SaveFormat::ALL {
        dialog = dialog.add_filter(fmt.label(), &[fmt.extension()]);
    }
    if let Some(dir) = source.and_then(|p| p.parent()) {
        dialog = dialog.set_directory(dir);
    }
    dialog.save_file()
}

/// Copy an RGBA image to the OS clipboard.
pub fn copy_to_clipboard(image: &RgbaImage) -> Result<(), String> {
    let mut clipboard = arboard::Clipboard::new().map_err(|e| e.to_string())?;
    clipboard
        .set_image(arboard::ImageData {
            width: image.width() as usize,
            height: image.height() as usize,
            bytes: std::borrow::Cow::Borrowed(image.as_raw()),
        })
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("warpfe_io_{}_{}", std::process::id(), name))
    }

    #[test]
    fn format_follows_extension() {
        assert_eq!(SaveFormat::from_path(Path::new("a/b.JPEG")), SaveFormat::Jpeg);
        assert_eq!(SaveFormat::from_path(Path::new("x.tif")), SaveFormat::Tiff);
        assert_eq!(SaveFormat::from_path(Path::new("noext")), SaveFormat::Png);
        assert_eq!(SaveFormat::from_name("webp"), None);
    }

    #[test]
    fn png_written_then_decoded() {
        let path = temp_path("roundtrip.png");
        let img = RgbaImage::from_pixel(5, 3, Rgba([1, 2, 3, 200]));
        encode_and_write(&img, &path, SaveFormat::Png, 90).unwrap();
        let back = load_image_sync(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(back, img);
    }

    #[test]
    fn undecodable_file_is_an_error() {
        let path = temp_path("garbage.png");
        std::fs::write(&path, b"definitely not a png").unwrap();
        let res = load_image_sync(&path);
        let _ = std::fs::remove_file(&path);
        assert!(res.is_err());
    }

    #[test]
    fn background_load_reports_generation() {
        let (tx, rx) = mpsc::channel();
        spawn_load(temp_path("missing.png"), 9, tx);
        match rx.recv().unwrap() {
            IoResult::LoadFailed { generation, .. } => assert_eq!(generation, 9),
            _ => panic!("expected LoadFailed"),
        }
    }
}
