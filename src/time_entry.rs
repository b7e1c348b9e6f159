use chrono::{DateTime, Utc};
use serde::Deserialize;

/// CRMバックエンドのtime entryレコードをデシリアライズするための構造体。
///
/// 数値やフラグは保存時に未設定のままになることがあるため、全てOptionで受ける。
#[derive(Clone, Debug, Deserialize)]
pub struct RawTimeEntry {
    pub id: String,
    pub user_id: String,
    pub project_id: Option<String>,
    pub client_id: Option<String>,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i64>,
    pub is_billable: Option<bool>,
    pub hourly_rate: Option<f64>,
}

/// 集計パイプラインで利用する正規化済みのtime entry。
///
/// 欠損しうるフィールドは正規化で既定値と表示名に解決済みのため、
/// 後段のステージはフィールドの有無で分岐しない。
#[derive(Clone, Debug, PartialEq)]
pub struct TimeEntry {
    pub id: String,
    pub user_id: String,
    pub user_name: String,
    pub project_id: Option<String>,
    pub project_name: String,
    pub client_id: Option<String>,
    pub client_name: String,
    pub description: String,
    pub start: DateTime<Utc>,
    pub stop: Option<DateTime<Utc>>,
    pub duration_minutes: i64,
    pub billable: bool,
    pub hourly_rate: f64,
}

/// クライアントの参照情報。
#[derive(Clone, Debug, Deserialize)]
pub struct Client {
    pub id: String,
    pub name: String,
}

/// プロジェクトの参照情報。
#[derive(Clone, Debug, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub client_id: Option<String>,
}

/// ユーザーの参照情報。
///
/// バックエンドの`profiles`テーブルでは表示名が`full_name`カラムに入っている。
#[derive(Clone, Debug, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(rename = "full_name")]
    pub name: String,
}
