/// Router Module Index
///
/// Routes are split by access level. Authentication is enforced once, as a
/// `route_layer` over the authenticated router; authorization happens inside each
/// organization-scoped handler through the permission engine.

/// Routes reachable without a session: sign-up, sign-in, password recovery,
/// invite preview and the health probe.
pub mod public;

/// Routes that require a valid bearer token.
pub mod authenticated;
