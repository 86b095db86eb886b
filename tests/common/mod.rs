//! Shared test harness for integration tests.
//!
//! External tools are replaced by small `/bin/sh` scripts written into a temp
//! directory. Each tool is configured as `/bin/sh <script> ...`, so nothing
//! needs an executable bit and no ffmpeg or Bento4 install is required. Every
//! script appends its role to `calls.log` so tests can check stage order.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

use streamforge::config::Config;
use streamforge::server::{create_router, AppContext};
use streamforge::store::MemoryVideoStore;
use streamforge_av::{BitrateLadder, FragmenterTool, PackagerTool, Rendition, ThumbnailerTool};

/// How the fake packager behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Packager {
    /// Writes segments for every input, then a manifest referencing them.
    Complete,
    /// Writes a manifest into staging, then exits 1.
    Fails,
    /// Writes segments but no manifest, exits 0.
    NoManifest,
    /// Writes a manifest referencing a segment it never wrote, exits 0.
    Dangling,
    /// Sleeps far past any test timeout.
    Hangs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Thumbnailer {
    Writes,
    Fails,
}

#[derive(Debug, Clone, Copy)]
pub struct FakeTools {
    pub fragmenter_fails: bool,
    pub packager: Packager,
    pub thumbnailer: Thumbnailer,
}

impl Default for FakeTools {
    fn default() -> Self {
        Self {
            fragmenter_fails: false,
            packager: Packager::Complete,
            thumbnailer: Thumbnailer::Writes,
        }
    }
}

const FRAGMENTER_OK: &str = r#"echo fragment >> "$LOG"
for a in "$@"; do
  case "$a" in
    *frag-*.mp4) echo "fragment of $a" > "$a" ;;
  esac
done
"#;

const FRAGMENTER_FAIL: &str = r#"echo fragment >> "$LOG"
echo "Invalid data found when processing input" >&2
exit 1
"#;

const PACKAGER_SEGMENTS: &str = r#"echo package >> "$LOG"
out="$1"
shift
reps=""
for f in "$@"; do
  name=$(basename "$f" .mp4)
  name=${name#frag-}
  if [ "$name" = audio ]; then
    dir="audio/en/mp4a.40.2"
  else
    dir="video/$name"
    reps="$reps<Representation id=\"video/$name\" bandwidth=\"1\"/>"
  fi
  mkdir -p "$out/$dir"
  echo "init $name" > "$out/$dir/init.mp4"
  echo "segment 1 $name" > "$out/$dir/seg-1.m4s"
done
"#;

const PACKAGER_MANIFEST: &str = r#"cat > "$out/stream.mpd" <<MPD
<?xml version="1.0" ?>
<MPD xmlns="urn:mpeg:dash:schema:mpd:2011" type="static">
  <Period>
    <AdaptationSet mimeType="video/mp4">
      <SegmentTemplate initialization="\$RepresentationID\$/init.mp4" media="\$RepresentationID\$/seg-\$Number\$.m4s" startNumber="1"/>
      $reps
    </AdaptationSet>
    <AdaptationSet mimeType="audio/mp4" lang="en">
      <SegmentTemplate initialization="\$RepresentationID\$/init.mp4" media="\$RepresentationID\$/seg-\$Number\$.m4s" startNumber="1"/>
      <Representation id="audio/en/mp4a.40.2" bandwidth="1"/>
    </AdaptationSet>
  </Period>
</MPD>
MPD
"#;

const PACKAGER_DANGLING: &str = r#"cat >> "$out/stream.mpd" <<MPD
<MPD><Period><AdaptationSet>
  <SegmentList><SegmentURL media="video/ghost/seg-9.m4s"/></SegmentList>
</AdaptationSet></Period></MPD>
MPD
"#;

const THUMBNAILER_OK: &str = r#"echo thumbnail >> "$LOG"
echo "frame at $1 of $2" > "$3"
"#;

const THUMBNAILER_FAIL: &str = r#"echo thumbnail >> "$LOG"
echo "Output file is empty, nothing was encoded" >&2
exit 1
"#;

fn packager_script(behavior: Packager) -> String {
    match behavior {
        Packager::Complete => format!("{PACKAGER_SEGMENTS}{PACKAGER_MANIFEST}"),
        Packager::Fails => format!(
            "{PACKAGER_SEGMENTS}{PACKAGER_MANIFEST}echo 'ERROR: packaging failed' >&2\nexit 1\n"
        ),
        Packager::NoManifest => PACKAGER_SEGMENTS.to_string(),
        Packager::Dangling => format!("{PACKAGER_SEGMENTS}{PACKAGER_DANGLING}"),
        Packager::Hangs => "echo package >> \"$LOG\"\nsleep 30\n".to_string(),
    }
}

/// Write the fake tool scripts into `dir` and point a config at them.
pub fn fake_config(base: &Path, dir: &Path, tools: FakeTools) -> Config {
    let log = dir.join("calls.log");
    let write = |name: &str, body: &str| -> String {
        let path = dir.join(name);
        std::fs::write(&path, format!("LOG='{}'\n{}", log.display(), body)).unwrap();
        path.display().to_string()
    };

    let fragmenter = write(
        "fragmenter.sh",
        if tools.fragmenter_fails {
            FRAGMENTER_FAIL
        } else {
            FRAGMENTER_OK
        },
    );
    let packager = write("packager.sh", &packager_script(tools.packager));
    let thumbnailer = write(
        "thumbnailer.sh",
        match tools.thumbnailer {
            Thumbnailer::Writes => THUMBNAILER_OK,
            Thumbnailer::Fails => THUMBNAILER_FAIL,
        },
    );

    let mut config = Config::default();
    config.storage.base_path = base.to_path_buf();
    config.tools.fragmenter = FragmenterTool {
        path: PathBuf::from("/bin/sh"),
        input_args: vec![fragmenter, "-i".into(), "{input}".into()],
        rendition_args: vec!["-b:v".into(), "{bitrate}k".into(), "{output}".into()],
        audio_args: vec!["-vn".into(), "{output}".into()],
    };
    config.tools.packager = PackagerTool {
        path: PathBuf::from("/bin/sh"),
        args: vec![packager, "{output_dir}".into(), "{inputs}".into()],
    };
    config.tools.thumbnailer = ThumbnailerTool {
        path: PathBuf::from("/bin/sh"),
        args: vec![thumbnailer, "{offset}".into(), "{input}".into(), "{output}".into()],
        ..ThumbnailerTool::default()
    };
    config.ladder = BitrateLadder {
        version: 1,
        renditions: vec![
            Rendition::new("160x90_250k", 160, 90, 250),
            Rendition::new("640x360_750k", 640, 360, 750),
        ],
    };
    config.timeouts.package_secs = 5;
    config
}

/// Test harness wrapping a storage tree, fake tools and a full [`AppContext`].
pub struct TestHarness {
    pub base: TempDir,
    pub tools_dir: TempDir,
    pub config: Config,
    pub store: Arc<MemoryVideoStore>,
    pub ctx: AppContext,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_tools(FakeTools::default())
    }

    pub fn with_tools(tools: FakeTools) -> Self {
        Self::with_tools_and(tools, |_| {})
    }

    /// Like [`with_tools`](Self::with_tools) but lets the test adjust the config.
    pub fn with_tools_and(tools: FakeTools, adjust: impl FnOnce(&mut Config)) -> Self {
        let base = tempfile::tempdir().unwrap();
        let tools_dir = tempfile::tempdir().unwrap();
        let mut config = fake_config(base.path(), tools_dir.path(), tools);
        adjust(&mut config);

        let store = Arc::new(MemoryVideoStore::new());
        let ctx = AppContext::new(config.clone(), store.clone());

        Self {
            base,
            tools_dir,
            config,
            store,
            ctx,
        }
    }

    pub fn router(&self) -> Router {
        create_router(self.ctx.clone())
    }

    pub fn video_dir(&self, owner: u64, video: u64) -> PathBuf {
        self.base.path().join(owner.to_string()).join(video.to_string())
    }

    /// Stage names in invocation order.
    pub fn calls(&self) -> Vec<String> {
        std::fs::read_to_string(self.tools_dir.path().join("calls.log"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// Write a source file directly into the layout, bypassing upload.
    pub fn place_source(&self, owner: u64, video: u64) -> PathBuf {
        let dir = self.video_dir(owner, video);
        std::fs::create_dir_all(&dir).unwrap();
        let source = dir.join("video.mp4");
        std::fs::write(&source, b"not really an mp4").unwrap();
        source
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.router()
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    pub async fn upload(&self, method: &str, uri: &str, form: Multipart) -> Response<Body> {
        send_form(self.router(), method, uri, form).await
    }
}

/// Send a multipart form to `router`.
pub async fn send_form(router: Router, method: &str, uri: &str, form: Multipart) -> Response<Body> {
    let (content_type, body) = form.finish();
    router
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .header("content-type", content_type)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap()
}

/// Helper to get response body as string
pub async fn body_to_string(body: Body) -> String {
    let bytes = body.collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_to_json(body: Body) -> serde_json::Value {
    serde_json::from_str(&body_to_string(body).await).unwrap()
}

/// Minimal multipart/form-data encoder.
#[derive(Default)]
pub struct Multipart {
    parts: Vec<u8>,
}

const BOUNDARY: &str = "streamforge-test-boundary";

impl Multipart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.parts.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, file_name: &str, data: &[u8]) -> Self {
        self.parts.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; \
                 name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: video/mp4\r\n\r\n"
            )
            .as_bytes(),
        );
        self.parts.extend_from_slice(data);
        self.parts.extend_from_slice(b"\r\n");
        self
    }

    /// A form with a title and one mp4 file.
    pub fn video(title: &str) -> Self {
        Self::new()
            .text("title", title)
            .file("file", "clip.mp4", b"fake mp4 payload")
    }

    fn finish(mut self) -> (String, Vec<u8>) {
        self.parts
            .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        (
            format!("multipart/form-data; boundary={BOUNDARY}"),
            self.parts,
        )
    }
}
