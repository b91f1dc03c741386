//! Admin credential gate
//!
//! An empty configured user disables the gate entirely.

use log::debug;

/// Credentials presented by a client.
#[derive(Clone, Copy, Debug)]
pub struct PresentedCredentials<'a> {
    pub user: &'a str,
    pub pass: &'a str,
}

#[derive(Clone, Debug, Default)]
pub struct AuthGate {
    user: String,
    pass: String,
}

impl AuthGate {
    pub fn new(user: impl Into<String>, pass: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            pass: pass.into(),
        }
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn is_disabled(&self) -> bool {
        self.user.is_empty()
    }

    pub fn check(&self, presented: Option<PresentedCredentials<'_>>) -> bool {
        if self.is_disabled() {
            return true;
        }

        let Some(presented) = presented else {
            debug!("auth gate: no credentials presented");
            return false;
        };

        // evaluate both sides so a wrong user costs the same as a wrong password
        let user_ok = constant_time_compare(presented.user, &self.user);
        let pass_ok = constant_time_compare(presented.pass, &self.pass);
        user_ok & pass_ok
    }
}

fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn presented<'a>(user: &'a str, pass: &'a str) -> Option<PresentedCredentials<'a>> {
        Some(PresentedCredentials { user, pass })
    }

    #[test]
    fn empty_user_disables_gate() {
        let gate = AuthGate::new("", "whatever");
        assert!(gate.check(None));
        assert!(gate.check(presented("x", "y")));
    }

    #[test]
    fn matching_credentials_pass() {
        let gate = AuthGate::new("admin", "admin");
        assert!(gate.check(presented("admin", "admin")));
    }

    #[test]
    fn comparison_is_case_sensitive() {
        let gate = AuthGate::new("admin", "Secret");
        assert!(!gate.check(presented("Admin", "Secret")));
        assert!(!gate.check(presented("admin", "secret")));
    }

    #[test]
    fn missing_credentials_fail() {
        let gate = AuthGate::new("admin", "admin");
        assert!(!gate.check(None));
    }

    #[test]
    fn prefix_does_not_match() {
        let gate = AuthGate::new("admin", "admin");
        assert!(!gate.check(presented("admin", "admi")));
        assert!(!gate.check(presented("admin", "admin1")));
    }
}
