use std::collections::HashMap;

use log::warn;

use crate::time_entry::{Client, Project, RawTimeEntry, TimeEntry, User};

/// プロジェクトidが未設定のentryに表示するラベル。
pub const NO_PROJECT_LABEL: &str = "no project";
/// クライアントidが未設定のentryに表示するラベル。
pub const UNASSIGNED_LABEL: &str = "unassigned";
/// 参照リストでidを解決できなかった場合に表示するラベル。
pub const UNKNOWN_LABEL: &str = "unknown";

/// 参照リストからidを表示名へ解決するためのルックアップ。
///
/// 表示名に加えて、グループの色割り当てに利用する参照リスト内の位置も保持する。
#[derive(Debug)]
pub struct Lookups {
    users: HashMap<String, (usize, String)>,
    clients: HashMap<String, (usize, String)>,
    projects: HashMap<String, (usize, String)>,
}

impl Lookups {
    /// 参照リストから新しい`Lookups`を作る。
    pub fn new(users: &[User], clients: &[Client], projects: &[Project]) -> Self {
        Self {
            users: users
                .iter()
                .enumerate()
                .map(|(position, user)| (user.id.clone(), (position, user.name.clone())))
                .collect(),
            clients: clients
                .iter()
                .enumerate()
                .map(|(position, client)| (client.id.clone(), (position, client.name.clone())))
                .collect(),
            projects: projects
                .iter()
                .enumerate()
                .map(|(position, project)| (project.id.clone(), (position, project.name.clone())))
                .collect(),
        }
    }

    pub fn user_name(&self, id: &str) -> Option<&str> {
        self.users.get(id).map(|(_, name)| name.as_str())
    }

    pub fn client_name(&self, id: &str) -> Option<&str> {
        self.clients.get(id).map(|(_, name)| name.as_str())
    }

    pub fn project_name(&self, id: &str) -> Option<&str> {
        self.projects.get(id).map(|(_, name)| name.as_str())
    }

    pub fn user_position(&self, id: &str) -> Option<usize> {
        self.users.get(id).map(|(position, _)| *position)
    }

    pub fn client_position(&self, id: &str) -> Option<usize> {
        self.clients.get(id).map(|(position, _)| *position)
    }

    pub fn project_position(&self, id: &str) -> Option<usize> {
        self.projects.get(id).map(|(position, _)| *position)
    }
}

/// 生のtime entryレコードを正規化する。
///
/// 欠損した数値は0、欠損したフラグはfalseへ倒し、参照は表示名に解決する。
/// 解決できない参照はエラーにせず代替ラベルへ落とす。
pub fn normalize(raw: &RawTimeEntry, lookups: &Lookups) -> TimeEntry {
    let duration_minutes = raw.duration_minutes.unwrap_or(0).max(0);

    // 保存されたdurationを正とし、start/endとの不一致は警告に留める
    if let (Some(stored), Some(end)) = (raw.duration_minutes, raw.end_time) {
        let derived = (end - raw.start_time).num_minutes();
        if derived != stored {
            warn!(
                "Entry {} stores {}min but start/end span is {}min",
                raw.id, stored, derived
            );
        }
    }

    let user_name = lookups
        .user_name(&raw.user_id)
        .unwrap_or(UNKNOWN_LABEL)
        .to_string();
    let project_name = match &raw.project_id {
        Some(id) => lookups.project_name(id).unwrap_or(UNKNOWN_LABEL).to_string(),
        None => NO_PROJECT_LABEL.to_string(),
    };
    let client_name = match &raw.client_id {
        Some(id) => lookups.client_name(id).unwrap_or(UNKNOWN_LABEL).to_string(),
        None => UNASSIGNED_LABEL.to_string(),
    };

    TimeEntry {
        id: raw.id.clone(),
        user_id: raw.user_id.clone(),
        user_name,
        project_id: raw.project_id.clone(),
        project_name,
        client_id: raw.client_id.clone(),
        client_name,
        description: raw.description.clone().unwrap_or_default(),
        start: raw.start_time,
        stop: raw.end_time,
        duration_minutes,
        billable: raw.is_billable.unwrap_or(false),
        hourly_rate: raw.hourly_rate.unwrap_or(0.0),
    }
}

/// 取得したtime entryをまとめて正規化する。入力の順序を保つ。
pub fn normalize_all(raw: &[RawTimeEntry], lookups: &Lookups) -> Vec<TimeEntry> {
    raw.iter().map(|entry| normalize(entry, lookups)).collect()
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use rstest::rstest;

    use super::{normalize, normalize_all, Lookups};
    use super::{NO_PROJECT_LABEL, UNASSIGNED_LABEL, UNKNOWN_LABEL};
    use crate::time_entry::{Client, Project, RawTimeEntry, User};

    fn lookups() -> Lookups {
        Lookups::new(
            &[User {
                id: "u1".to_string(),
                name: "Alice".to_string(),
            }],
            &[Client {
                id: "c1".to_string(),
                name: "Acme".to_string(),
            }],
            &[Project {
                id: "p1".to_string(),
                name: "Website".to_string(),
                client_id: Some("c1".to_string()),
            }],
        )
    }

    fn raw_entry() -> RawTimeEntry {
        RawTimeEntry {
            id: "e1".to_string(),
            user_id: "u1".to_string(),
            project_id: Some("p1".to_string()),
            client_id: Some("c1".to_string()),
            description: Some("fix login".to_string()),
            start_time: Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap(),
            end_time: Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()),
            duration_minutes: Some(60),
            is_billable: Some(true),
            hourly_rate: Some(100.0),
        }
    }

    /// 全フィールドが揃ったentryがそのまま解決されることを確認する。
    #[test]
    fn test_normalize_resolved() {
        let entry = normalize(&raw_entry(), &lookups());

        assert_eq!(entry.user_name, "Alice");
        assert_eq!(entry.client_name, "Acme");
        assert_eq!(entry.project_name, "Website");
        assert_eq!(entry.duration_minutes, 60);
        assert!(entry.billable);
        assert_eq!(entry.hourly_rate, 100.0);
    }

    /// 欠損したフィールドが既定値へ倒れることを確認する。
    #[test]
    fn test_normalize_defaults() {
        let raw = RawTimeEntry {
            project_id: None,
            client_id: None,
            description: None,
            end_time: None,
            duration_minutes: None,
            is_billable: None,
            hourly_rate: None,
            ..raw_entry()
        };

        let entry = normalize(&raw, &lookups());

        assert_eq!(entry.duration_minutes, 0);
        assert_eq!(entry.hourly_rate, 0.0);
        assert!(!entry.billable);
        assert_eq!(entry.description, "");
        assert_eq!(entry.project_name, NO_PROJECT_LABEL);
        assert_eq!(entry.client_name, UNASSIGNED_LABEL);
    }

    /// 参照リストで解決できないidが代替ラベルへ落ちることを確認する。
    #[rstest]
    #[case::unknown_user("u9", Some("p1"), Some("c1"))]
    #[case::unknown_project("u1", Some("p9"), Some("c1"))]
    #[case::unknown_client("u1", Some("p1"), Some("c9"))]
    fn test_normalize_unresolved_reference(
        #[case] user_id: &str,
        #[case] project_id: Option<&str>,
        #[case] client_id: Option<&str>,
    ) {
        let raw = RawTimeEntry {
            user_id: user_id.to_string(),
            project_id: project_id.map(str::to_string),
            client_id: client_id.map(str::to_string),
            ..raw_entry()
        };

        let entry = normalize(&raw, &lookups());

        let names = [entry.user_name, entry.project_name, entry.client_name];
        assert!(names.contains(&UNKNOWN_LABEL.to_string()));
    }

    /// 負のdurationが0へ丸められることを確認する。
    #[test]
    fn test_normalize_negative_duration() {
        let raw = RawTimeEntry {
            duration_minutes: Some(-30),
            ..raw_entry()
        };

        assert_eq!(normalize(&raw, &lookups()).duration_minutes, 0);
    }

    /// 複数entryの正規化で入力順が保たれることを確認する。
    #[test]
    fn test_normalize_all_keeps_order() {
        let first = raw_entry();
        let second = RawTimeEntry {
            id: "e2".to_string(),
            ..raw_entry()
        };

        let entries = normalize_all(&[first, second], &lookups());

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, "e1");
        assert_eq!(entries[1].id, "e2");
    }
}
