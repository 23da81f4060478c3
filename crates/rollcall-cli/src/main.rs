use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use rollcall_attendance::{BatchOutcome, BatchProcessor, ImageFailure, RunSummary, Upload, ROSTER_FILE_NAME};
use rollcall_core::{OnnxAnalyzer, ARCFACE_MODEL_FILE, SCRFD_MODEL_FILE};
use rollcall_imaging::Annotator;
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "rollcall", about = "Classroom attendance from photos")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Recognize students in photos and write the attendance roster
    Run {
        /// Directory of reference student images
        #[arg(short, long)]
        gallery: PathBuf,
        /// Where attendance.csv and annotated images are written
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
        /// Print the result as JSON instead of text
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        models: ModelArgs,
        /// Classroom photos (.jpg, .jpeg, .png)
        #[arg(required = true)]
        images: Vec<PathBuf>,
    },
    /// Index a gallery and list the identities that produced an embedding
    Gallery {
        /// Directory of reference student images
        #[arg(short, long)]
        gallery: PathBuf,
        #[command(flatten)]
        models: ModelArgs,
    },
}

#[derive(Args)]
struct ModelArgs {
    /// Directory containing det_10g.onnx and w600k_r50.onnx
    #[arg(long, env = "ROLLCALL_MODEL_DIR")]
    model_dir: Option<PathBuf>,
    /// Cosine similarity needed for a gallery match
    #[arg(long, env = "ROLLCALL_SIMILARITY_THRESHOLD", default_value_t = rollcall_core::DEFAULT_SIMILARITY_THRESHOLD)]
    similarity_threshold: f32,
    /// Minimum face detection score
    #[arg(long, env = "ROLLCALL_DETECTION_THRESHOLD", default_value_t = rollcall_core::SCRFD_CONFIDENCE_THRESHOLD)]
    detection_threshold: f32,
    /// TrueType font for face labels
    #[arg(long, env = "ROLLCALL_FONT_PATH")]
    font: Option<PathBuf>,
}

impl ModelArgs {
    fn load_analyzer(&self) -> Result<OnnxAnalyzer> {
        let dir = self
            .model_dir
            .clone()
            .unwrap_or_else(rollcall_core::default_model_dir);
        let scrfd = dir.join(SCRFD_MODEL_FILE);
        let arcface = dir.join(ARCFACE_MODEL_FILE);

        OnnxAnalyzer::load(
            &scrfd.to_string_lossy(),
            &arcface.to_string_lossy(),
            self.detection_threshold,
            self.similarity_threshold,
        )
        .with_context(|| format!("loading face models from {}", dir.display()))
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            gallery,
            out,
            json,
            models,
            images,
        } => run(&gallery, &out, json, &models, &images),
        Commands::Gallery { gallery, models } => list_gallery(&gallery, &models),
    }
}

fn require_gallery(gallery: &Path) -> Result<()> {
    if !gallery.exists() {
        bail!(
            "The specified database path does not exist. Please provide a valid path. ({})",
            gallery.display()
        );
    }
    Ok(())
}

/// Read image files, skipping unsupported extensions.
fn read_uploads(images: &[PathBuf]) -> Result<Vec<Upload>> {
    let mut uploads = Vec::with_capacity(images.len());
    for path in images {
        if !rollcall_core::has_image_extension(path) {
            eprintln!("Skipped {}: only .jpg, .jpeg and .png files are accepted.", path.display());
            continue;
        }
        let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        uploads.push(Upload {
            file_name: path.to_string_lossy().into_owned(),
            bytes,
        });
    }
    Ok(uploads)
}

fn run(gallery: &Path, out: &Path, json: bool, models: &ModelArgs, images: &[PathBuf]) -> Result<()> {
    require_gallery(gallery)?;
    let uploads = read_uploads(images)?;
    if uploads.is_empty() {
        bail!("Please upload images and provide a valid database path.");
    }

    let mut analyzer = models.load_analyzer()?;
    let annotator = Annotator::with_font_search(models.font.as_deref());

    if !json {
        println!("Processing {} images...", uploads.len());
    }
    let outcome = BatchProcessor::new(&mut analyzer, &annotator).process(&uploads, gallery);

    let written = write_outputs(&outcome, out)?;

    if json {
        print_json(&outcome, &written)?;
    } else {
        print_text(&outcome, &written);
    }
    Ok(())
}

/// Write the roster (when anyone was recognized) and annotated PNGs. Returns the written paths.
fn write_outputs(outcome: &BatchOutcome, out: &Path) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    let annotated_dir = out.join("annotated");
    std::fs::create_dir_all(&annotated_dir)
        .with_context(|| format!("creating {}", annotated_dir.display()))?;

    let roster = outcome.roster();
    if !roster.is_empty() {
        let path = out.join(ROSTER_FILE_NAME);
        std::fs::write(&path, roster.to_csv()?).with_context(|| format!("writing {}", path.display()))?;
        written.push(path);
    }

    let mut taken = HashSet::new();
    for annotated in &outcome.annotated {
        let path = annotated_dir.join(annotated_file_name(&annotated.file_name, &mut taken));
        annotated
            .image
            .save(&path)
            .with_context(|| format!("writing {}", path.display()))?;
        tracing::debug!(upload = %annotated.file_name, path = %path.display(), "annotated image written");
        written.push(path);
    }

    Ok(written)
}

/// `<stem>.png` for an upload, suffixed `-2`, `-3`, ... when an earlier upload took the name.
fn annotated_file_name(upload_name: &str, taken: &mut HashSet<String>) -> String {
    let stem = Path::new(upload_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());

    let mut name = format!("{stem}.png");
    let mut n = 2;
    while !taken.insert(name.clone()) {
        name = format!("{stem}-{n}.png");
        n += 1;
    }
    name
}

fn print_text(outcome: &BatchOutcome, written: &[PathBuf]) {
    let summary = &outcome.summary;
    for failure in &outcome.failures {
        eprintln!("{failure}");
    }
    if summary.anomalies > 0 {
        eprintln!(
            "Gallery search returned {} more matches than detected faces; unknown count clamped at zero.",
            summary.anomalies
        );
    }

    println!("Total faces detected: {}", summary.total_faces);
    println!("Recognized faces: {}", summary.recognized());
    println!("Unknown faces: {}", summary.unknown_faces);

    let roster = outcome.roster();
    if roster.is_empty() {
        println!("No faces recognized");
    } else {
        println!("Attendance Marked for:");
        for name in roster.names() {
            println!("  {name}");
        }
    }

    for path in written {
        println!("wrote {}", path.display());
    }
}

/// Machine-readable result of `rollcall run --json`.
#[derive(Serialize)]
struct JsonReport<'a> {
    #[serde(flatten)]
    summary: RunSummary,
    recognized: usize,
    names: &'a [String],
    failures: &'a [ImageFailure],
    written: &'a [PathBuf],
}

fn print_json(outcome: &BatchOutcome, written: &[PathBuf]) -> Result<()> {
    let roster = outcome.roster();
    let report = JsonReport {
        summary: outcome.summary,
        recognized: outcome.summary.recognized(),
        names: roster.names(),
        failures: &outcome.failures,
        written,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn list_gallery(gallery: &Path, models: &ModelArgs) -> Result<()> {
    require_gallery(gallery)?;
    let mut analyzer = models.load_analyzer()?;
    let entries = analyzer.gallery_entries(gallery)?;

    if entries.is_empty() {
        println!("No faces found in gallery {}", gallery.display());
        return Ok(());
    }
    for entry in entries {
        println!("{}", entry.identity);
    }
    println!("{} identities indexed", entries.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use rollcall_attendance::{AnnotatedImage, FailureStage};

    fn annotated(name: &str) -> AnnotatedImage {
        AnnotatedImage { file_name: name.into(), image: RgbImage::from_pixel(4, 4, Rgb([1, 2, 3])) }
    }

    #[test]
    fn test_require_gallery() {
        let dir = tempfile::tempdir().unwrap();
        assert!(require_gallery(dir.path()).is_ok());

        let err = require_gallery(&dir.path().join("missing")).unwrap_err();
        assert!(err.to_string().starts_with("The specified database path does not exist."));
    }

    #[test]
    fn test_read_uploads_filters_extensions() {
        let dir = tempfile::tempdir().unwrap();
        let photo = dir.path().join("class.JPG");
        let notes = dir.path().join("notes.txt");
        std::fs::write(&photo, b"jpeg bytes").unwrap();
        std::fs::write(&notes, b"text").unwrap();

        let uploads = read_uploads(&[photo.clone(), notes]).unwrap();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].file_name, photo.to_string_lossy());
        assert_eq!(uploads[0].bytes, b"jpeg bytes");
    }

    #[test]
    fn test_read_uploads_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_uploads(&[dir.path().join("gone.png")]).is_err());
    }

    #[test]
    fn test_annotated_file_names_are_unique() {
        let mut taken = HashSet::new();
        assert_eq!(annotated_file_name("monday/class.jpg", &mut taken), "class.png");
        assert_eq!(annotated_file_name("tuesday/class.png", &mut taken), "class-2.png");
        assert_eq!(annotated_file_name("class.jpeg", &mut taken), "class-3.png");
        assert_eq!(annotated_file_name("other.jpg", &mut taken), "other.png");
    }

    #[test]
    fn test_write_outputs_same_stem_keeps_both_images() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = BatchOutcome {
            annotated: vec![annotated("monday/class.jpg"), annotated("tuesday/class.png")],
            ..Default::default()
        };

        let written = write_outputs(&outcome, dir.path()).unwrap();
        assert_eq!(written.len(), 2);
        assert_ne!(written[0], written[1]);
        for path in &written {
            assert!(path.exists(), "{} missing", path.display());
        }
        assert_eq!(std::fs::read_dir(dir.path().join("annotated")).unwrap().count(), 2);
    }

    #[test]
    fn test_write_outputs_without_recognitions_skips_roster() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = BatchOutcome { annotated: vec![annotated("a.png")], ..Default::default() };

        let written = write_outputs(&outcome, dir.path()).unwrap();
        assert_eq!(written, vec![dir.path().join("annotated").join("a.png")]);
        assert!(!dir.path().join(ROSTER_FILE_NAME).exists());
    }

    #[test]
    fn test_write_outputs_writes_roster() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = BatchOutcome {
            identities: vec!["/g/alice/alice1.jpg".into(), "/g/bob/bob1.jpg".into()],
            ..Default::default()
        };

        write_outputs(&outcome, dir.path()).unwrap();
        let csv = std::fs::read_to_string(dir.path().join(ROSTER_FILE_NAME)).unwrap();
        assert_eq!(csv, "Student Name\nalice1.jpg\nbob1.jpg\n");
    }

    #[test]
    fn test_json_report_shape() {
        let report = JsonReport {
            summary: RunSummary { total_faces: 3, unknown_faces: 1, anomalies: 0 },
            recognized: 2,
            names: &["alice1.jpg".to_string(), "bob1.jpg".to_string()],
            failures: &[ImageFailure {
                file_name: "bad.png".into(),
                stage: FailureStage::Decode,
                message: "decoding image: empty upload".into(),
            }],
            written: &[],
        };

        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["total_faces"], 3);
        assert_eq!(value["unknown_faces"], 1);
        assert_eq!(value["recognized"], 2);
        assert_eq!(value["names"][1], "bob1.jpg");
        assert_eq!(value["failures"][0]["file"], "bad.png");
        assert_eq!(value["failures"][0]["stage"], "decode");
    }
}
