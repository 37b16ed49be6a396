//! Exit codes of the `hubctl` binary
//!
//! These follow Unix conventions and sysexits.h where applicable.

/// General error - unspecified failure
pub const ERROR: i32 = 1;

/// Configuration error - unreadable or invalid settings or kubeconfig
pub const CONFIG_ERROR: i32 = 2;

/// Template error - a manifest or stack template failed to render
pub const TEMPLATE_ERROR: i32 = 3;

/// Provisioning error - a stack failed, timed out or could not be deleted
pub const PROVISION_ERROR: i32 = 4;

/// Release error - helm or kubectl reported a failure
pub const RELEASE_ERROR: i32 = 5;

/// Not found - the named cluster or hub does not exist
pub const NOT_FOUND: i32 = 6;

/// IO error - a file could not be read or written, or a tool could not start
pub const IO_ERROR: i32 = 74;

/// Usage error - invalid arguments or options (following sysexits.h convention)
pub const USAGE_ERROR: i32 = 64;
