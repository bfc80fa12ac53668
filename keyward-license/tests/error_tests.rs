use keyward_license::{ErrorKind, LicenseError};
use keyward_store::StoreError;

const ALL: [ErrorKind; 6] = [
    ErrorKind::LicenseNotFound,
    ErrorKind::DeviceMismatch,
    ErrorKind::FraudBlocked,
    ErrorKind::TrialAlreadyActive,
    ErrorKind::ServerError,
    ErrorKind::DatabaseError,
];

#[test]
fn labels_match_serde() {
    for kind in ALL {
        let json = serde_json::to_string(&kind).unwrap();
        assert_eq!(json, format!("\"{}\"", kind.as_str()));
        assert_eq!(kind.to_string(), kind.as_str());
        assert_eq!(kind.as_str().parse::<ErrorKind>(), Ok(kind));
    }
}

#[test]
fn unknown_label_does_not_parse() {
    assert!("kaboom".parse::<ErrorKind>().is_err());
}

#[test]
fn fatal_errors_map_to_kinds() {
    assert_eq!(LicenseError::from(StoreError::LockPoisoned).kind(), ErrorKind::DatabaseError);
    assert_eq!(LicenseError::Network("down".into()).kind(), ErrorKind::ServerError);
    assert_eq!(
        LicenseError::Server {
            status: 502,
            message: "bad gateway".into()
        }
        .kind(),
        ErrorKind::ServerError
    );
}

#[test]
fn server_error_message() {
    let err = LicenseError::Server {
        status: 404,
        message: "no such route".into(),
    };
    assert_eq!(err.to_string(), "server returned 404: no such route");
}
