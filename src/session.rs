// Session controller module
// The state machine behind the open/save/close lifecycle of a single image

use log::{debug, info};
use std::path::{Path, PathBuf};

use crate::engine::ImageEngine;
use crate::error::SessionError;

/// The currently loaded image together with the path it belongs to.
///
/// Bundling the two means a bitmap can never outlive its session slot: when
/// the session drops the entry, both go together.
struct Active<B> {
    bitmap: B,
    path: PathBuf,
}

/// Controls the lifecycle of the single image a window is working on.
///
/// All mutating operations are atomic from the caller's perspective: state is
/// only updated after the engine call succeeds, so a failed open or save
/// leaves the previous image, path and display intact and is safe to retry.
pub struct Session<E: ImageEngine> {
    engine: E,
    active: Option<Active<E::Bitmap>>,
}

impl<E: ImageEngine> Session<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            active: None,
        }
    }

    /// Whether an image is currently loaded
    pub fn has_image(&self) -> bool {
        self.active.is_some()
    }

    /// Path the image was opened from or last saved to
    pub fn file_path(&self) -> Option<&Path> {
        self.active.as_ref().map(|a| a.path.as_path())
    }

    /// The currently loaded bitmap, if any
    pub fn bitmap(&self) -> Option<&E::Bitmap> {
        self.active.as_ref().map(|a| &a.bitmap)
    }

    /// The engine this session drives (for the about dialog's version string)
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Window title suffix for the current image
    pub fn title_suffix(&self) -> Option<String> {
        self.active.as_ref().map(|a| basename(&a.path))
    }

    /// Decode the file at `path` and make it the active image.
    ///
    /// May be called in either state; opening while an image is loaded
    /// replaces it. The previous image is only released once the decode has
    /// succeeded. Returns the title suffix for the window.
    pub fn open(&mut self, path: &Path) -> Result<String, SessionError> {
        let bitmap = self
            .engine
            .decode(path)
            .map_err(|cause| SessionError::DecodeFailed {
                path: path.to_path_buf(),
                cause,
            })?;

        self.active = Some(Active {
            bitmap,
            path: path.to_path_buf(),
        });
        info!("Opened image: {}", path.display());
        Ok(basename(path))
    }

    /// Encode the active image back to the path it was opened from
    pub fn save(&self) -> Result<(), SessionError> {
        let active = self.active.as_ref().ok_or(SessionError::NoActiveImage)?;
        self.engine
            .encode(&active.bitmap, &active.path)
            .map_err(|cause| SessionError::EncodeFailed {
                path: active.path.clone(),
                cause,
            })?;
        info!("Saved image: {}", active.path.display());
        Ok(())
    }

    /// Encode the active image to `path`, which becomes the new file path.
    ///
    /// The stored path is only updated when the encode succeeds. Returns the
    /// new title suffix for the window.
    pub fn save_as(&mut self, path: &Path) -> Result<String, SessionError> {
        let active = self.active.as_mut().ok_or(SessionError::NoActiveImage)?;
        self.engine
            .encode(&active.bitmap, path)
            .map_err(|cause| SessionError::EncodeFailed {
                path: path.to_path_buf(),
                cause,
            })?;
        active.path = path.to_path_buf();
        info!("Saved image as: {}", path.display());
        Ok(basename(path))
    }

    /// Drop the active image and its path. Idempotent.
    pub fn close(&mut self) {
        if self.active.take().is_some() {
            info!("Closed image");
        } else {
            debug!("Close requested with no image loaded");
        }
    }

    /// Ordered property/value pairs describing the active image
    pub fn query_info(&self) -> Result<Vec<(String, String)>, SessionError> {
        let active = self.active.as_ref().ok_or(SessionError::NoActiveImage)?;
        let mut props = vec![("filename".to_string(), active.path.display().to_string())];
        props.extend(self.engine.describe(&active.bitmap));
        Ok(props)
    }
}

fn basename(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use std::cell::RefCell;
    use std::collections::HashSet;

    /// Scripted engine: decodes any path into its display string, with
    /// configurable failures and a log of every encode call.
    #[derive(Default)]
    struct MockEngine {
        decode_failures: HashSet<PathBuf>,
        encode_failures: HashSet<PathBuf>,
        encoded: RefCell<Vec<PathBuf>>,
    }

    impl ImageEngine for MockEngine {
        type Bitmap = String;

        fn decode(&self, path: &Path) -> anyhow::Result<String> {
            if self.decode_failures.contains(path) {
                bail!("corrupt data");
            }
            Ok(path.display().to_string())
        }

        fn encode(&self, _bitmap: &String, path: &Path) -> anyhow::Result<()> {
            if self.encode_failures.contains(path) {
                bail!("disk full");
            }
            self.encoded.borrow_mut().push(path.to_path_buf());
            Ok(())
        }

        fn describe(&self, bitmap: &String) -> Vec<(String, String)> {
            vec![("decoded from".to_string(), bitmap.clone())]
        }

        fn version(&self) -> String {
            "mock engine".to_string()
        }
    }

    fn filename_of(session: &Session<MockEngine>) -> String {
        let props = session.query_info().unwrap();
        let (key, value) = &props[0];
        assert_eq!(key, "filename");
        value.clone()
    }

    #[test]
    fn starts_without_an_image() {
        let session = Session::new(MockEngine::default());
        assert!(!session.has_image());
        assert!(session.file_path().is_none());
        assert!(session.bitmap().is_none());
        assert!(matches!(
            session.query_info(),
            Err(SessionError::NoActiveImage)
        ));
    }

    #[test]
    fn open_then_query_reports_filename() {
        let mut session = Session::new(MockEngine::default());
        let suffix = session.open(Path::new("photo.jpg")).unwrap();
        assert_eq!(suffix, "photo.jpg");
        assert!(session.has_image());
        assert_eq!(filename_of(&session), "photo.jpg");
    }

    #[test]
    fn open_returns_basename_as_title_suffix() {
        let mut session = Session::new(MockEngine::default());
        let suffix = session.open(Path::new("/home/user/pics/photo.jpg")).unwrap();
        assert_eq!(suffix, "photo.jpg");
        assert_eq!(session.title_suffix().as_deref(), Some("photo.jpg"));
    }

    #[test]
    fn failed_open_preserves_previous_image() {
        let mut engine = MockEngine::default();
        engine.decode_failures.insert(PathBuf::from("bad.jpg"));
        let mut session = Session::new(engine);

        session.open(Path::new("a.jpg")).unwrap();
        let err = session.open(Path::new("bad.jpg")).unwrap_err();
        assert!(matches!(err, SessionError::DecodeFailed { .. }));

        // the session was not corrupted by the failed open
        assert!(session.has_image());
        assert_eq!(filename_of(&session), "a.jpg");
        assert_eq!(session.bitmap().unwrap(), "a.jpg");
    }

    #[test]
    fn failed_open_in_empty_state_stays_empty() {
        let mut engine = MockEngine::default();
        engine.decode_failures.insert(PathBuf::from("bad.jpg"));
        let mut session = Session::new(engine);

        assert!(session.open(Path::new("bad.jpg")).is_err());
        assert!(!session.has_image());
        assert!(session.bitmap().is_none());
    }

    #[test]
    fn open_replaces_current_image() {
        let mut session = Session::new(MockEngine::default());
        session.open(Path::new("a.jpg")).unwrap();
        session.open(Path::new("b.jpg")).unwrap();
        assert_eq!(session.bitmap().unwrap(), "b.jpg");
        assert_eq!(filename_of(&session), "b.jpg");
    }

    #[test]
    fn close_is_idempotent() {
        let mut session = Session::new(MockEngine::default());
        session.open(Path::new("a.jpg")).unwrap();

        session.close();
        assert!(!session.has_image());
        assert!(session.file_path().is_none());
        assert!(session.bitmap().is_none());
        assert!(matches!(
            session.query_info(),
            Err(SessionError::NoActiveImage)
        ));

        // a second close observes exactly the same state
        session.close();
        assert!(!session.has_image());
        assert!(session.file_path().is_none());
    }

    #[test]
    fn save_requires_an_open_image() {
        let session = Session::new(MockEngine::default());
        assert!(matches!(session.save(), Err(SessionError::NoActiveImage)));
        assert!(session.engine().encoded.borrow().is_empty());
    }

    #[test]
    fn save_writes_to_the_opened_path() {
        let mut session = Session::new(MockEngine::default());
        session.open(Path::new("a.jpg")).unwrap();
        session.save().unwrap();
        assert_eq!(
            session.engine().encoded.borrow().as_slice(),
            &[PathBuf::from("a.jpg")]
        );
        // save does not move the file path
        assert_eq!(session.file_path().unwrap(), Path::new("a.jpg"));
    }

    #[test]
    fn failed_save_reports_encode_error() {
        let mut engine = MockEngine::default();
        engine.encode_failures.insert(PathBuf::from("a.jpg"));
        let mut session = Session::new(engine);
        session.open(Path::new("a.jpg")).unwrap();
        assert!(matches!(
            session.save(),
            Err(SessionError::EncodeFailed { .. })
        ));
        // still loaded and retryable
        assert!(session.has_image());
    }

    #[test]
    fn save_as_updates_path_on_success() {
        let mut session = Session::new(MockEngine::default());
        session.open(Path::new("a.jpg")).unwrap();
        let suffix = session.save_as(Path::new("b.jpg")).unwrap();
        assert_eq!(suffix, "b.jpg");
        assert_eq!(session.file_path().unwrap(), Path::new("b.jpg"));

        // a plain save now targets the new path
        session.save().unwrap();
        assert_eq!(
            session.engine().encoded.borrow().as_slice(),
            &[PathBuf::from("b.jpg"), PathBuf::from("b.jpg")]
        );
    }

    #[test]
    fn failed_save_as_keeps_previous_path() {
        let mut engine = MockEngine::default();
        engine.encode_failures.insert(PathBuf::from("readonly.jpg"));
        let mut session = Session::new(engine);
        session.open(Path::new("a.jpg")).unwrap();

        let err = session.save_as(Path::new("readonly.jpg")).unwrap_err();
        assert!(matches!(err, SessionError::EncodeFailed { .. }));
        assert_eq!(session.file_path().unwrap(), Path::new("a.jpg"));
        assert_eq!(filename_of(&session), "a.jpg");
    }

    #[test]
    fn save_as_without_image_never_reaches_the_engine() {
        let mut session = Session::new(MockEngine::default());
        assert!(matches!(
            session.save_as(Path::new("b.jpg")),
            Err(SessionError::NoActiveImage)
        ));
        assert!(session.engine().encoded.borrow().is_empty());
    }

    #[test]
    fn scenario_open_query_close_query() {
        let mut session = Session::new(MockEngine::default());
        assert!(matches!(
            session.query_info(),
            Err(SessionError::NoActiveImage)
        ));

        session.open(Path::new("photo.jpg")).unwrap();
        let props = session.query_info().unwrap();
        assert!(props.contains(&("filename".to_string(), "photo.jpg".to_string())));
        // engine-provided properties follow the filename entry
        assert!(props.contains(&("decoded from".to_string(), "photo.jpg".to_string())));

        session.close();
        assert!(matches!(
            session.query_info(),
            Err(SessionError::NoActiveImage)
        ));
    }
}
