//! Delta filter

use crate::models::ListedUser;

/// Status code of an active user
pub const ACTIVE_STATUS: i64 = 0;

/// Selects users worth enriching: active and modified strictly after the
/// watermark.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeltaFilter {
    watermark: i64,
}

impl DeltaFilter {
    pub fn new(watermark: i64) -> Self {
        Self { watermark }
    }

    pub fn watermark(&self) -> i64 {
        self.watermark
    }

    pub fn admits(&self, user: &ListedUser) -> bool {
        user.modified_date > self.watermark && user.status == ACTIVE_STATUS
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(modified_date: i64, status: i64) -> ListedUser {
        ListedUser::from_value(
            json!({"modifiedDate": modified_date, "status": status}),
            "http://portal/api/jsonws/user/get-company-users",
        )
        .unwrap()
    }

    #[test]
    fn test_watermark_is_exclusive() {
        let filter = DeltaFilter::new(1_000);
        assert!(!filter.admits(&row(999, 0)));
        assert!(!filter.admits(&row(1_000, 0)));
        assert!(filter.admits(&row(1_001, 0)));
    }

    #[test]
    fn test_inactive_users_never_pass() {
        let filter = DeltaFilter::new(0);
        for status in [1, 2, 5, -1] {
            assert!(!filter.admits(&row(i64::MAX, status)));
        }
    }
}
