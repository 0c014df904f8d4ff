#[cfg(test)]
mod tests {
    use crate::error::*;
    use std::error::Error;
    use std::io;

    #[test]
    fn test_core_error_display() {
        let err = CoreError::ConfigurationError("empty appname".to_string());
        assert_eq!(err.to_string(), "Configuration error: empty appname");

        let err = CoreError::ProcessSpawn("no such file".to_string());
        assert_eq!(err.to_string(), "Process spawn error: no such file");

        let err = CoreError::ProcessSignal("EINVAL".to_string());
        assert_eq!(err.to_string(), "Process signal error: EINVAL");

        let err = CoreError::ProcessWait("interrupted".to_string());
        assert_eq!(err.to_string(), "Process wait error: interrupted");
    }

    #[test]
    fn test_core_error_from_std_error() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let core_err: CoreError = io_err.into();

        if let CoreError::IoError(_) = core_err {
            // Expected variant
        } else {
            panic!("Expected CoreError::IoError variant");
        }
    }

    #[test]
    fn test_error_trait_implementation() {
        let err = CoreError::ServiceError("test".to_string());
        let _: &dyn Error = &err;
        assert!(err.source().is_none());

        let err: CoreError = io::Error::new(io::ErrorKind::Other, "boom").into();
        assert!(err.source().is_some());
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            CoreError::ConfigurationError("test".to_string()).code(),
            "CORE001"
        );
        assert_eq!(
            CoreError::InitializationError("test".to_string()).code(),
            "CORE003"
        );
        assert_eq!(
            CoreError::ServiceError("test".to_string()).code(),
            "CORE004"
        );
        assert_eq!(CoreError::ProcessSpawn("test".to_string()).code(), "CORE007");
        assert_eq!(CoreError::ProcessSignal("test".to_string()).code(), "CORE008");
        assert_eq!(CoreError::ProcessWait("test".to_string()).code(), "CORE009");
    }
}
