//! The atomic unit around a duplication.

use crate::Result;
use crate::storage::Storage;
use rusqlite::Transaction;
use tracing::warn;

/// Run `work` in one transaction: commit on success, roll back on any error.
///
/// The error from `work` is returned unchanged, even if the rollback itself fails.
pub fn atomically<T, F>(storage: &mut Storage, work: F) -> Result<T>
where
    F: FnOnce(&Transaction<'_>) -> Result<T>,
{
    let tx = storage.transaction()?;
    match work(&tx) {
        Ok(value) => {
            tx.commit()?;
            Ok(value)
        }
        Err(e) => {
            warn!(error = %e, "rolling back");
            if let Err(rollback) = tx.rollback() {
                warn!(error = %rollback, "rollback failed");
            }
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::models::User;
    use crate::storage::Records;
    use crate::test_utils::TestEnv;

    #[test]
    fn test_commit_on_success() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();

        let id = atomically(&mut storage, |tx| {
            Ok(Records::new(tx).create_user(&User::new("ana"))?.id)
        })
        .unwrap();

        assert_eq!(storage.records().get_user(id).unwrap().username, "ana");
    }

    #[test]
    fn test_rollback_on_error() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();

        let result: Result<()> = atomically(&mut storage, |tx| {
            Records::new(tx).create_user(&User::new("ana"))?;
            Err(Error::Other("boom".to_string()))
        });

        assert!(matches!(result, Err(Error::Other(_))));
        assert!(matches!(
            storage.records().get_user(1),
            Err(Error::NotFound(_))
        ));
    }
}
