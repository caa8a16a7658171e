//! Lifecycle guards of the process-wide manager.
//!
//! Kept in one test so nothing else in the process races the singleton.

use mdlx_driver::{MdlxError, RequestEnvelope, SignRequest};

#[test]
fn uninitialized_manager_rejects_all_calls() {
    let req = RequestEnvelope::Sign(SignRequest::new(&[1], &[2], &[3]).unwrap());
    assert!(matches!(
        mdlx_driver::request(req),
        Err(MdlxError::NotInitialized)
    ));
    assert!(matches!(
        mdlx_driver::shutdown(),
        Err(MdlxError::NotInitialized)
    ));
}
