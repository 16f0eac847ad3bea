//! Property-based tests for specifier parsing.
//!
//! These tests generate specifiers from their components and verify that
//! parsing recovers exactly those components.

#[cfg(test)]
mod proptest_tests {
    use crate::descriptor::{parse, Protocol, DEFAULT_HOST, HEAD, SUPPORTED_HOSTS};
    use proptest::prelude::*;

    fn host() -> impl Strategy<Value = &'static str> {
        prop::sample::select(SUPPORTED_HOSTS.to_vec())
    }

    fn word() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9_-]{0,11}"
    }

    fn subdir() -> impl Strategy<Value = Option<Vec<String>>> {
        prop::option::of(prop::collection::vec(word(), 1..4))
    }

    fn git_ref() -> impl Strategy<Value = Option<String>> {
        prop::option::of("[a-zA-Z0-9][a-zA-Z0-9._/-]{0,15}")
    }

    proptest! {
        /// Property: every component encoded into a URL-style specifier is recovered
        #[test]
        fn parse_recovers_url_components(
            host in host(),
            protocol in prop::option::of(prop::sample::select(vec!["http", "https"])),
            user in word(),
            name in word(),
            git_suffix in any::<bool>(),
            subdir in subdir(),
            reference in git_ref(),
        ) {
            let mut spec = String::new();
            if let Some(protocol) = protocol {
                spec.push_str(protocol);
                spec.push_str("://");
            }
            spec.push_str(&format!("{}/{}/{}", host, user, name));
            if git_suffix {
                spec.push_str(".git");
            }
            if let Some(parts) = &subdir {
                spec.push('/');
                spec.push_str(&parts.join("/"));
            }
            if let Some(reference) = &reference {
                spec.push('#');
                spec.push_str(reference);
            }

            let repo = parse(&spec).unwrap();
            prop_assert_eq!(&repo.site, host);
            prop_assert_eq!(&repo.user, &user);
            prop_assert_eq!(&repo.name, &name);
            prop_assert_eq!(repo.subdir, subdir.map(|parts| parts.join("/")));
            prop_assert_eq!(repo.r#ref, reference.unwrap_or_else(|| HEAD.to_string()));
            let expected_protocol = if protocol == Some("https") { Protocol::Https } else { Protocol::Http };
            prop_assert_eq!(repo.protocol, expected_protocol);
        }

        /// Property: the ssh form recovers the same components
        #[test]
        fn parse_recovers_ssh_components(
            host in host(),
            user in word(),
            name in word(),
            reference in git_ref(),
        ) {
            let mut spec = format!("git@{}:{}/{}.git", host, user, name);
            if let Some(reference) = &reference {
                spec.push('#');
                spec.push_str(reference);
            }

            let repo = parse(&spec).unwrap();
            prop_assert_eq!(&repo.site, host);
            prop_assert_eq!(&repo.name, &name);
            prop_assert_eq!(repo.ssh_url, format!("git@{}:{}/{}", host, user, name));
        }

        /// Property: specifiers without a host use the default host
        #[test]
        fn parse_without_host_uses_default(user in word(), name in word()) {
            let repo = parse(&format!("{}/{}", user, name)).unwrap();
            prop_assert_eq!(repo.site, DEFAULT_HOST);
            prop_assert_eq!(repo.r#ref, HEAD);
        }

        /// Property: hosts outside the supported set are always rejected
        #[test]
        fn parse_rejects_unsupported_hosts(
            host in "[a-z]{3,8}\\.(net|io|dev)",
            user in word(),
            name in word(),
        ) {
            let err = parse(&format!("https://{}/{}/{}", host, user, name)).unwrap_err();
            prop_assert_eq!(err.code(), "UNSUPPORTED_HOST");
        }
    }
}
