/// Router Module Index
///
/// Organizes the application's routing logic into role-segregated modules,
/// mirroring the access gate's route classification table. The gate wraps the
/// assembled router and performs the actual authorization; the module split
/// keeps each portal's endpoints in one place and makes the classified
/// prefixes visible in the source tree.

/// Routes accessible without a session: auth pages, liveness, the suspension
/// notice, and `/me` (which answers from gate-attached context when present).
pub mod public;

/// Routes under `/admin`, reachable only by admin-role sessions.
pub mod admin;

/// Routes under `/student`, reachable only by student-role sessions.
pub mod student;

/// Routes under `/instructor`, reachable only by instructor-role sessions.
pub mod instructor;

/// Routes under `/accountant`, reachable only by accountant-role sessions.
pub mod accountant;
