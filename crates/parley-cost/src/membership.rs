// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Membership tiers.
//!
//! A membership is active iff `is_member` is set and `member_until` lies in
//! the future. Expired or absent memberships price as non-members.

use chrono::{DateTime, Utc};
use parley_core::types::UserAccount;
use strum::{Display, EnumString};

/// Membership level as stored on the user row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub enum MemberLevel {
    #[strum(serialize = "free")]
    Free,
    #[strum(serialize = "VIP")]
    Vip,
    #[strum(serialize = "SVIP")]
    Svip,
}

/// The tier a user is priced at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tier {
    NonMember,
    Vip,
    Svip,
    /// Active membership whose level has no discount (`free` or unrecognized).
    Other(String),
}

impl Tier {
    /// Resolves the tier of `user` at `now`.
    pub fn of(user: &UserAccount, now: DateTime<Utc>) -> Self {
        if !is_active(user, now) {
            return Tier::NonMember;
        }
        match user.member_level.parse::<MemberLevel>() {
            Ok(MemberLevel::Vip) => Tier::Vip,
            Ok(MemberLevel::Svip) => Tier::Svip,
            Ok(MemberLevel::Free) | Err(_) => Tier::Other(user.member_level.clone()),
        }
    }
}

/// Active membership: `is_member ∧ now < member_until`.
pub fn is_active(user: &UserAccount, now: DateTime<Utc>) -> bool {
    user.is_member && user.member_until.is_some_and(|until| now < until)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn user(is_member: bool, level: &str, until: Option<DateTime<Utc>>) -> UserAccount {
        UserAccount {
            id: 1,
            username: "alice".into(),
            points: 0,
            is_member,
            member_level: level.into(),
            member_until: until,
        }
    }

    #[test]
    fn active_vip_and_svip() {
        let now = Utc::now();
        let later = Some(now + Duration::days(3));
        assert_eq!(Tier::of(&user(true, "VIP", later), now), Tier::Vip);
        assert_eq!(Tier::of(&user(true, "SVIP", later), now), Tier::Svip);
    }

    #[test]
    fn expired_or_flagless_membership_is_non_member() {
        let now = Utc::now();
        let earlier = Some(now - Duration::seconds(1));
        let later = Some(now + Duration::days(1));
        assert_eq!(Tier::of(&user(true, "VIP", earlier), now), Tier::NonMember);
        assert_eq!(Tier::of(&user(false, "SVIP", later), now), Tier::NonMember);
        assert_eq!(Tier::of(&user(true, "VIP", None), now), Tier::NonMember);
    }

    #[test]
    fn membership_ending_now_is_inactive() {
        let now = Utc::now();
        assert!(!is_active(&user(true, "VIP", Some(now)), now));
    }

    #[test]
    fn unrecognized_active_level() {
        let now = Utc::now();
        let later = Some(now + Duration::days(1));
        let tier = Tier::of(&user(true, "GOLD", later), now);
        assert_eq!(tier, Tier::Other("GOLD".into()));
    }
}
