//! # Authorization Filter
//!
//! Keeps only the pushes this relay is allowed to act on: addressed to our
//! own device and sent from one of the configured source devices. Anything
//! else is dropped without a reply.

use std::collections::HashSet;

use crate::pushbullet::Push;

/// Returns the pushes with `target == own_iden` and `source ∈ authorised`.
///
/// Deleted pushes and pushes without a body are dropped as well; the provider
/// reports deletions as inactive pushes once `modified_after` is in play.
pub fn authorize<I>(pushes: I, own_iden: &str, authorised: &HashSet<String>) -> Vec<Push>
where
    I: IntoIterator<Item = Push>,
{
    pushes
        .into_iter()
        .filter(|push| {
            let keep = is_authorised(push, own_iden, authorised);
            if !keep {
                log::debug!(
                    "Ignoring push {} (source={:?}, target={:?}, active={})",
                    push.iden,
                    push.source_device_iden,
                    push.target_device_iden,
                    push.active
                );
            }
            keep
        })
        .collect()
}

fn is_authorised(push: &Push, own_iden: &str, authorised: &HashSet<String>) -> bool {
    let to_us = push.target_device_iden.as_deref() == Some(own_iden);
    let from_trusted = push
        .source_device_iden
        .as_deref()
        .is_some_and(|src| authorised.contains(src));
    push.active && push.body.is_some() && to_us && from_trusted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authorised() -> HashSet<String> {
        ["abc".to_string()].into_iter().collect()
    }

    #[test]
    fn test_keeps_only_trusted_pushes_to_us() {
        let pushes = vec![
            Push::note("p1", "reboot", "abc", "me", 1.0),
            Push::note("p2", "reboot", "mallory", "me", 2.0),
            Push::note("p3", "reboot", "abc", "someone-else", 3.0),
        ];

        let kept = authorize(pushes, "me", &authorised());
        let idens: Vec<&str> = kept.iter().map(|p| p.iden.as_str()).collect();
        assert_eq!(idens, vec!["p1"]);
    }

    #[test]
    fn test_drops_missing_fields_and_deleted_pushes() {
        let mut no_source = Push::note("p1", "reboot", "abc", "me", 1.0);
        no_source.source_device_iden = None;
        let mut no_target = Push::note("p2", "reboot", "abc", "me", 1.0);
        no_target.target_device_iden = None;
        let mut deleted = Push::note("p3", "reboot", "abc", "me", 1.0);
        deleted.active = false;
        let mut no_body = Push::note("p4", "reboot", "abc", "me", 1.0);
        no_body.body = None;

        let kept = authorize(vec![no_source, no_target, deleted, no_body], "me", &authorised());
        assert!(kept.is_empty());
    }

    #[test]
    fn test_empty_authorised_set_drops_everything() {
        let kept = authorize(
            vec![Push::note("p1", "reboot", "abc", "me", 1.0)],
            "me",
            &HashSet::new(),
        );
        assert!(kept.is_empty());
    }
}
