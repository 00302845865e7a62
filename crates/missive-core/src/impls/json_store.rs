//! JsonFileStateStore - ファイル上の状態ドキュメント
//!
//! # 実装詳細
//! - save: 同じディレクトリの一時ファイルに書いて fsync → rename で置き換え
//! - load: 壊れたドキュメントは `<name>.corrupt-<ts>` に退避してから「無し」として扱う
//!   （次の run で作り直されるが、元のファイルは残る）

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::domain::{DeliveryState, MissiveResult};
use crate::ports::DeliveryStateStore;

#[derive(Debug, Clone)]
pub struct JsonFileStateStore {
    path: PathBuf,
}

impl JsonFileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "state".to_string());
        self.path
            .with_file_name(format!(".{file_name}.tmp.{}", std::process::id()))
    }

    /// Move an unreadable document out of the way so the next save cannot clobber it.
    fn quarantine(&self) -> MissiveResult<PathBuf> {
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "state".to_string());
        let stamp = Utc::now().format("%Y%m%d%H%M%S%3f");
        let aside = self
            .path
            .with_file_name(format!("{file_name}.corrupt-{stamp}"));
        fs::rename(&self.path, &aside)?;
        Ok(aside)
    }
}

impl DeliveryStateStore for JsonFileStateStore {
    fn load(&self) -> MissiveResult<Option<DeliveryState>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str(&raw) {
            Ok(state) => Ok(Some(state)),
            Err(e) => {
                let aside = self.quarantine()?;
                tracing::warn!(
                    path = %self.path.display(),
                    moved_to = %aside.display(),
                    error = %e,
                    "state document is unreadable, moved aside and treating it as empty"
                );
                Ok(None)
            }
        }
    }

    fn save(&self, state: &DeliveryState) -> MissiveResult<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let body = serde_json::to_vec_pretty(state)?;
        let tmp_path = self.temp_path();

        let write_result = (|| -> io::Result<()> {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(&body)?;
            file.sync_all()?;
            fs::rename(&tmp_path, &self.path)
        })();

        if let Err(e) = write_result {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }
        Ok(())
    }

    fn clear(&self) -> MissiveResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
