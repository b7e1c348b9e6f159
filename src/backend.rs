use std::env;

use anyhow::{Context, Result};
use log::info;
use reqwest::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;

use crate::datetime::RangeBounds;
use crate::time_entry::{Client, Project, RawTimeEntry, User};

/// CRMバックエンドからレコードを取得するためのリポジトリ。
#[cfg_attr(test, mockall::automock)]
pub trait CrmRepository {
    /// 指定した時間窓のタイムエントリーを取得する。
    ///
    /// # Arguments
    ///
    /// * `bounds` - 取得するタイムエントリーの時間窓
    async fn read_time_entries(&self, bounds: &RangeBounds) -> Result<Vec<RawTimeEntry>>;

    /// クライアントの参照リストを取得する。
    async fn read_clients(&self) -> Result<Vec<Client>>;

    /// プロジェクトの参照リストを取得する。
    async fn read_projects(&self) -> Result<Vec<Project>>;

    /// ユーザーの参照リストを取得する。
    async fn read_users(&self) -> Result<Vec<User>>;
}

/// CRMバックエンド(PostgREST互換API)と通信するためのクライアント。
///
/// # Examples
///
/// ```
/// let client = CrmClient::new().unwrap();
/// let entries = client.read_time_entries(&bounds).await.unwrap();
/// ```
pub struct CrmClient {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl CrmClient {
    /// 新しい`CrmClient`を返す。
    ///
    /// 環境変数`CRM_API_URL`と`CRM_API_KEY`が設定されていない場合はエラーを返す。
    pub fn new() -> Result<Self> {
        let api_url = env::var("CRM_API_URL").context("CRM_API_URL must be set")?;
        let api_key = env::var("CRM_API_KEY").context("CRM_API_KEY must be set")?;

        Ok(Self {
            client: reqwest::Client::new(),
            api_url,
            api_key,
        })
    }

    /// テスト用に接続先を指定した`CrmClient`を返す。
    #[cfg(test)]
    pub fn with_base_url(api_url: String, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url,
            api_key,
        }
    }

    /// 指定テーブルからレコードの一覧を取得する。
    async fn fetch<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(String, String)],
    ) -> Result<Vec<T>> {
        let rows = self
            .client
            .get(format!("{}/rest/v1/{}", self.api_url, table))
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header(CONTENT_TYPE, "application/json")
            .query(query)
            .send()
            .await
            .with_context(|| format!("Failed to send request to CRM API at {}", self.api_url))?
            .error_for_status()
            .context("Request returned an error status")?
            .json::<Vec<T>>()
            .await
            .context("Failed to deserialize response")?;

        Ok(rows)
    }
}

impl CrmRepository for CrmClient {
    async fn read_time_entries(&self, bounds: &RangeBounds) -> Result<Vec<RawTimeEntry>> {
        // 何にも一致しない時間窓では問い合わせ自体を行わない
        if *bounds == RangeBounds::Empty {
            return Ok(Vec::new());
        }

        let mut query = vec![
            ("select".to_string(), "*".to_string()),
            ("order".to_string(), "start_time.asc".to_string()),
        ];
        if let RangeBounds::Between(from, to) = bounds {
            query.push(("start_time".to_string(), format!("gte.{}", from.to_rfc3339())));
            query.push(("start_time".to_string(), format!("lte.{}", to.to_rfc3339())));
        }

        let entries = self
            .fetch("time_entries", &query)
            .await
            .context("Failed to get time entries from CRM")?;
        info!("length of time entries: {}", entries.len());

        Ok(entries)
    }

    async fn read_clients(&self) -> Result<Vec<Client>> {
        self.fetch(
            "clients",
            &[("select".to_string(), "id,name".to_string())],
        )
        .await
        .context("Failed to get client list from CRM")
    }

    async fn read_projects(&self) -> Result<Vec<Project>> {
        self.fetch(
            "projects",
            &[("select".to_string(), "id,name,client_id".to_string())],
        )
        .await
        .context("Failed to get project list from CRM")
    }

    async fn read_users(&self) -> Result<Vec<User>> {
        self.fetch(
            "profiles",
            &[("select".to_string(), "id,full_name".to_string())],
        )
        .await
        .context("Failed to get user list from CRM")
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use mockito::Matcher;

    use super::{CrmClient, CrmRepository};
    use crate::datetime::RangeBounds;

    const API_KEY: &str = "test-key";

    /// 時間窓がクエリパラメータへ反映されることを確認する。
    #[tokio::test]
    async fn test_read_time_entries_bounded() {
        let mut server = mockito::Server::new_async().await;
        let from = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2024, 5, 31, 23, 59, 59).unwrap();
        let mock = server
            .mock("GET", "/rest/v1/time_entries")
            .match_header("apikey", API_KEY)
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("select".to_string(), "*".to_string()),
                Matcher::UrlEncoded("order".to_string(), "start_time.asc".to_string()),
                Matcher::UrlEncoded("start_time".to_string(), format!("gte.{}", from.to_rfc3339())),
                Matcher::UrlEncoded("start_time".to_string(), format!("lte.{}", to.to_rfc3339())),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"[{
                    "id": "e1",
                    "user_id": "u1",
                    "project_id": null,
                    "client_id": "c1",
                    "description": "fix login",
                    "start_time": "2024-05-01T09:00:00+00:00",
                    "end_time": null,
                    "duration_minutes": 60,
                    "is_billable": true,
                    "hourly_rate": null
                }]"#,
            )
            .create_async()
            .await;
        let client = CrmClient::with_base_url(server.url(), API_KEY.to_string());

        let entries = client
            .read_time_entries(&RangeBounds::Between(from, to))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, "e1");
        assert_eq!(entries[0].duration_minutes, Some(60));
        assert_eq!(entries[0].hourly_rate, None);
    }

    /// 空の時間窓では問い合わせを行わないことを確認する。
    #[tokio::test]
    async fn test_read_time_entries_empty_bounds() {
        let client = CrmClient::with_base_url(
            "http://localhost:1".to_string(),
            API_KEY.to_string(),
        );

        let entries = client.read_time_entries(&RangeBounds::Empty).await.unwrap();

        assert!(entries.is_empty());
    }

    /// `profiles`テーブルの`full_name`が表示名へマップされることを確認する。
    #[tokio::test]
    async fn test_read_users() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/rest/v1/profiles")
            .match_query(Matcher::UrlEncoded(
                "select".to_string(),
                "id,full_name".to_string(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"[{"id": "u1", "full_name": "Alice"}]"#)
            .create_async()
            .await;
        let client = CrmClient::with_base_url(server.url(), API_KEY.to_string());

        let users = client.read_users().await.unwrap();

        mock.assert_async().await;
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].name, "Alice");
    }

    /// エラーステータスがエラーとして返ることを確認する。
    #[tokio::test]
    async fn test_read_clients_error_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/rest/v1/clients")
            .match_query(Matcher::Any)
            .with_status(500)
            .create_async()
            .await;
        let client = CrmClient::with_base_url(server.url(), API_KEY.to_string());

        let result = client.read_clients().await;

        assert!(result.is_err());
    }
}
