// A camera that "streams" pre-recorded JPEG stills from a directory.
// Used by the demo binary on machines without a webcam binding.

use crate::capture::device::{CameraDevice, DeviceError, VideoStream};
use crate::data_structures::{EncodedImage, StreamConstraints};
use async_trait::async_trait;
use log::info;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Clone, Debug)]
pub struct StillFrameCamera {
    dir: PathBuf,
}

impl StillFrameCamera {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        StillFrameCamera { dir: dir.into() }
    }

    fn is_jpeg(path: &Path) -> bool {
        matches!(
            path.extension().and_then(|e| e.to_str()).map(|e| e.to_ascii_lowercase()),
            Some(ext) if ext == "jpg" || ext == "jpeg"
        )
    }
}

#[async_trait]
impl CameraDevice for StillFrameCamera {
    async fn acquire(
        &self,
        constraints: &StreamConstraints,
    ) -> Result<Box<dyn VideoStream>, DeviceError> {
        let mut entries = tokio::fs::read_dir(&self.dir).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::PermissionDenied => DeviceError::PermissionDenied(e.to_string()),
            std::io::ErrorKind::NotFound => DeviceError::NotFound,
            _ => DeviceError::Other(e.to_string()),
        })?;

        let mut paths = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| DeviceError::Other(e.to_string()))?
        {
            let path = entry.path();
            if Self::is_jpeg(&path) {
                paths.push(path);
            }
        }
        paths.sort();

        let mut frames = Vec::with_capacity(paths.len());
        for path in &paths {
            let bytes = tokio::fs::read(path)
                .await
                .map_err(|e| DeviceError::Other(format!("{}: {}", path.display(), e)))?;
            frames.push(bytes);
        }
        if frames.is_empty() {
            return Err(DeviceError::NotFound);
        }

        info!("[StillCamera] Loaded {} frames from {}", frames.len(), self.dir.display());
        Ok(Box::new(StillFrameStream {
            frames,
            cursor: AtomicUsize::new(0),
            width: constraints.ideal_width,
            height: constraints.ideal_height,
            live: true,
        }))
    }
}

struct StillFrameStream {
    frames: Vec<Vec<u8>>,
    cursor: AtomicUsize,
    width: u32,
    height: u32,
    live: bool,
}

impl VideoStream for StillFrameStream {
    // Stills are already encoded; quality is whatever they were saved at
    fn snapshot(&self, _jpeg_quality: f32) -> Result<EncodedImage, DeviceError> {
        if !self.live {
            return Err(DeviceError::Other("stream stopped".to_string()));
        }
        let index = self.cursor.fetch_add(1, Ordering::SeqCst) % self.frames.len();
        Ok(EncodedImage::jpeg(self.frames[index].clone(), self.width, self.height))
    }

    fn stop(&mut self) {
        self.live = false;
    }

    fn is_live(&self) -> bool {
        self.live
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_structures::FacingMode;

    fn constraints() -> StreamConstraints {
        StreamConstraints { facing: FacingMode::User, ideal_width: 640, ideal_height: 640 }
    }

    #[tokio::test]
    async fn cycles_through_sorted_jpegs() {
        let dir = std::env::temp_dir().join(format!("veridface-still-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join("b.jpg"), b"second").await.unwrap();
        tokio::fs::write(dir.join("a.JPEG"), b"first").await.unwrap();
        tokio::fs::write(dir.join("notes.txt"), b"ignored").await.unwrap();

        let camera = StillFrameCamera::new(&dir);
        let stream = camera.acquire(&constraints()).await.unwrap();
        assert_eq!(stream.snapshot(0.8).unwrap().bytes, b"first".to_vec());
        assert_eq!(stream.snapshot(0.8).unwrap().bytes, b"second".to_vec());
        assert_eq!(stream.snapshot(0.8).unwrap().bytes, b"first".to_vec());

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn missing_directory_is_not_found() {
        let camera = StillFrameCamera::new("/no/such/frames/dir");
        let err = camera.acquire(&constraints()).await.err().unwrap();
        assert_eq!(err, DeviceError::NotFound);
    }
}
