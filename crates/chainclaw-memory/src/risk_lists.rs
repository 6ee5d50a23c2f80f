//! Per-user allow/block lists for the Risk Engine (spec.md §4.8).

use chrono::Utc;
use rusqlite::params;

use crate::error::StoreResult;
use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListType {
    Allow,
    Block,
}

impl ListType {
    fn as_str(self) -> &'static str {
        match self {
            ListType::Allow => "allow",
            ListType::Block => "block",
        }
    }
}

impl Store {
    pub async fn add_to_risk_list(
        &self,
        user_id: &str,
        chain_id: u64,
        address: &str,
        list_type: ListType,
    ) -> StoreResult<()> {
        let conn = self.conn().await;
        conn.execute(
            "INSERT INTO risk_lists (user_id, chain_id, address, list_type, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(user_id, chain_id, address, list_type) DO NOTHING",
            params![
                user_id,
                chain_id as i64,
                address.to_lowercase(),
                list_type.as_str(),
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub async fn remove_from_risk_list(
        &self,
        user_id: &str,
        chain_id: u64,
        address: &str,
        list_type: ListType,
    ) -> StoreResult<()> {
        let conn = self.conn().await;
        conn.execute(
            "DELETE FROM risk_lists WHERE user_id = ?1 AND chain_id = ?2 AND address = ?3 AND list_type = ?4",
            params![user_id, chain_id as i64, address.to_lowercase(), list_type.as_str()],
        )?;
        Ok(())
    }

    pub async fn is_on_risk_list(
        &self,
        user_id: &str,
        chain_id: u64,
        address: &str,
        list_type: ListType,
    ) -> StoreResult<bool> {
        let conn = self.conn().await;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM risk_lists WHERE user_id = ?1 AND chain_id = ?2 AND address = ?3 AND list_type = ?4",
            params![user_id, chain_id as i64, address.to_lowercase(), list_type.as_str()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn blocklisted_address_is_reported() {
        let store = Store::open_in_memory().await.unwrap();
        store.add_to_risk_list("u1", 1, "0xBAD", ListType::Block).await.unwrap();
        assert!(store.is_on_risk_list("u1", 1, "0xbad", ListType::Block).await.unwrap());
        assert!(!store.is_on_risk_list("u1", 1, "0xbad", ListType::Allow).await.unwrap());
    }

    #[tokio::test]
    async fn removal_clears_membership() {
        let store = Store::open_in_memory().await.unwrap();
        store.add_to_risk_list("u1", 1, "0xbad", ListType::Block).await.unwrap();
        store.remove_from_risk_list("u1", 1, "0xbad", ListType::Block).await.unwrap();
        assert!(!store.is_on_risk_list("u1", 1, "0xbad", ListType::Block).await.unwrap());
    }

    #[tokio::test]
    async fn lists_are_scoped_per_user() {
        let store = Store::open_in_memory().await.unwrap();
        store.add_to_risk_list("u1", 1, "0xbad", ListType::Block).await.unwrap();
        assert!(!store.is_on_risk_list("u2", 1, "0xbad", ListType::Block).await.unwrap());
    }
}
