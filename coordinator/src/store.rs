//! ルールストア
//!
//! ルーティングルールをJSONファイルとして永続化する。
//! 書き込みは一時ファイル→fsync→renameのアトミック置換で行う。

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use claw_mesh_common::{error::CoordinatorResult, types::RoutingRule};
use serde::{Deserialize, Serialize};
use tokio::{
    fs,
    io::AsyncWriteExt,
    sync::Mutex,
};

/// ルールファイル名
pub const RULES_FILE_NAME: &str = "rules.json";

/// ディスク上のJSON構造
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreData {
    #[serde(default)]
    rules: Vec<RoutingRule>,
}

/// ファイルバックのルールストア
pub struct RuleStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl RuleStore {
    /// 指定パスをバックエンドとするストアを作成する。
    /// 親ディレクトリが無ければ0700で作成する。
    pub fn new(path: impl Into<PathBuf>) -> CoordinatorResult<Self> {
        let path = path.into();
        if let Some(dir) = path.parent() {
            create_private_dir(dir)?;
        }
        Ok(Self {
            path,
            lock: Mutex::new(()),
        })
    }

    /// ストアのファイルパス
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// ルールを読み込む。ファイルが無ければ空集合を返す。
    pub async fn load_rules(&self) -> CoordinatorResult<Vec<RoutingRule>> {
        let _guard = self.lock.lock().await;

        let data = match fs::read(&self.path).await {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let sd: StoreData = serde_json::from_slice(&data)?;
        Ok(sd.rules)
    }

    /// ルールをアトミックに書き込む。
    pub async fn save_rules(&self, rules: &[RoutingRule]) -> CoordinatorResult<()> {
        let _guard = self.lock.lock().await;

        let sd = StoreData {
            rules: rules.to_vec(),
        };
        let data = serde_json::to_vec_pretty(&sd)?;

        // 同一ディレクトリ内の一意な一時ファイルに書いてからrenameする
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let tmp = self.path.with_extension(format!("tmp.{nanos}"));

        if let Err(err) = write_and_sync(&tmp, &data).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(err.into());
        }

        if let Err(err) = fs::rename(&tmp, &self.path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(err.into());
        }
        Ok(())
    }
}

/// 0600で作成した一時ファイルへ書き込み、fsyncする
async fn write_and_sync(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await?;
    file.write_all(data).await?;
    file.sync_all().await?;
    Ok(())
}

/// 0700でディレクトリを再帰作成する
fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(dir)
}
