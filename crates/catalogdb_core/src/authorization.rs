//! Study scoped access control.
//!
//! ACL entries are `member__PERMISSION` strings. Members are user ids,
//! `@group` ids, `@members`, `*` (any authenticated user) and `anonymous`.
//! For a given user the most specific member with any entry decides, in the
//! order user, their groups, `@members`, `*`, `anonymous`. Entities without
//! an applicable entry inherit the study level grant, e.g. `VIEW_SAMPLES`.

use catalogdb_codec::{Document, Value};
use catalogdb_store::Filter;

use crate::error::{CatalogError, CatalogResult};
use crate::model::Study;
use crate::types::{fields, EntityKind};
use crate::utils::text_list;

/// Group every study member belongs to.
pub const MEMBERS: &str = "@members";
/// Group whose users have every permission.
pub const ADMINS: &str = "@admins";
/// Any authenticated user.
pub const ANY_USER: &str = "*";
/// The unauthenticated user.
pub const ANONYMOUS: &str = "anonymous";

/// Who is asking for what.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationContext {
    /// Acting user.
    pub user: String,
    /// Entity level permission, e.g. `VIEW`.
    pub permission: String,
}

impl AuthorizationContext {
    /// Creates a context.
    pub fn new(user: impl Into<String>, permission: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            permission: permission.into(),
        }
    }

    /// Study level permission covering `kind`, e.g. `VIEW_SAMPLES`.
    #[must_use]
    pub fn study_permission(&self, kind: EntityKind) -> String {
        format!("{}_{}", self.permission, kind.permission_suffix())
    }
}

/// Members that may speak for `user`, most specific level first.
fn member_levels(study: &Study, user: &str) -> Vec<Vec<String>> {
    let groups: Vec<String> = study
        .groups_of(user)
        .into_iter()
        .filter(|g| *g != MEMBERS && *g != ADMINS)
        .map(str::to_string)
        .collect();
    let mut levels = vec![vec![user.to_string()], groups];
    if is_member(study, user) {
        levels.push(vec![MEMBERS.to_string()]);
    }
    if user != ANONYMOUS {
        levels.push(vec![ANY_USER.to_string()]);
    }
    levels.push(vec![ANONYMOUS.to_string()]);
    levels.retain(|level| !level.is_empty());
    levels
}

/// Decision of the most specific level with any entry in `acl`, or `None`
/// when no level has one.
fn resolve(acl: &[String], levels: &[Vec<String>], permission: &str) -> Option<bool> {
    levels.iter().find_map(|level| {
        let mut applies = false;
        for member in level {
            let prefix = format!("{member}__");
            for entry in acl.iter().filter(|e| e.starts_with(&prefix)) {
                applies = true;
                if entry[prefix.len()..] == *permission {
                    return Some(true);
                }
            }
        }
        applies.then_some(false)
    })
}

/// Whether `user` owns the study or is one of its admins.
#[must_use]
pub fn is_admin(study: &Study, user: &str) -> bool {
    study.owner == user
        || study
            .group(ADMINS)
            .is_some_and(|g| g.user_ids.iter().any(|u| u == user))
}

/// Whether `user` belongs to the study.
#[must_use]
pub fn is_member(study: &Study, user: &str) -> bool {
    is_admin(study, user) || !study.groups_of(user).is_empty()
}

fn has_public_grant(study: &Study, user: &str) -> bool {
    study.acl.iter().any(|e| {
        e.starts_with(&format!("{ANONYMOUS}__"))
            || (user != ANONYMOUS && e.starts_with(&format!("{ANY_USER}__")))
    })
}

/// Whether `user` holds the study level permission for `kind`.
#[must_use]
pub fn has_study_permission(study: &Study, ctx: &AuthorizationContext, kind: EntityKind) -> bool {
    if is_admin(study, &ctx.user) {
        return true;
    }
    let levels = member_levels(study, &ctx.user);
    resolve(&study.acl, &levels, &ctx.study_permission(kind)).unwrap_or(false)
}

fn denied(ctx: &AuthorizationContext, reason: impl Into<String>) -> CatalogError {
    CatalogError::authorization(&ctx.user, &ctx.permission, reason)
}

/// Restriction a listing query needs for `ctx`.
///
/// `entity_acls` says whether any entity of the kind in the study carries
/// ACL entries. Returns `None` when the user sees everything.
///
/// # Errors
///
/// `Authorization` when the user has no access to the study at all.
pub fn query_for_authorised_entries(
    study: &Study,
    ctx: &AuthorizationContext,
    kind: EntityKind,
    entity_acls: bool,
) -> CatalogResult<Option<Filter>> {
    if is_admin(study, &ctx.user) {
        return Ok(None);
    }
    if !is_member(study, &ctx.user) && !has_public_grant(study, &ctx.user) {
        return Err(denied(
            ctx,
            format!("not a member of study '{}'", study.id),
        ));
    }
    let study_grant = has_study_permission(study, ctx, kind);
    if study_grant && !entity_acls {
        return Ok(None);
    }

    let levels = member_levels(study, &ctx.user);
    let mut alternatives = Vec::new();
    let mut more_specific: Vec<&str> = Vec::new();
    for level in &levels {
        let granted: Vec<Value> = level
            .iter()
            .map(|m| Value::from(format!("{m}__{}", ctx.permission)))
            .collect();
        let grant = Filter::In(fields::ACL.to_string(), granted);
        if more_specific.is_empty() {
            alternatives.push(grant);
        } else {
            alternatives.push(Filter::And(vec![grant, none_of(&more_specific)?]));
        }
        more_specific.extend(level.iter().map(String::as_str));
    }
    if study_grant {
        alternatives.push(none_of(&more_specific)?);
    }
    Ok(Some(Filter::Or(alternatives)))
}

/// `_acl` has no entry for any of `members`.
fn none_of(members: &[&str]) -> CatalogResult<Filter> {
    let alternation = members
        .iter()
        .map(|m| regex::escape(m))
        .collect::<Vec<_>>()
        .join("|");
    let pattern = format!("^({alternation})__");
    let any = Filter::regex(fields::ACL, &pattern)?;
    Ok(Filter::not(any))
}

/// Hard check for a single required operation on one entity.
///
/// # Errors
///
/// `Authorization` when the permission is not held.
pub fn check_entity_permission(
    study: &Study,
    entity: &Document,
    ctx: &AuthorizationContext,
    kind: EntityKind,
) -> CatalogResult<()> {
    if is_admin(study, &ctx.user) {
        return Ok(());
    }
    if !is_member(study, &ctx.user) && !has_public_grant(study, &ctx.user) {
        return Err(denied(
            ctx,
            format!("not a member of study '{}'", study.id),
        ));
    }
    let levels = member_levels(study, &ctx.user);
    let acl = text_list(entity.get_array(fields::ACL));
    let allowed = match resolve(&acl, &levels, &ctx.permission) {
        Some(decision) => decision,
        None => has_study_permission(study, ctx, kind),
    };
    if allowed {
        Ok(())
    } else {
        Err(denied(
            ctx,
            format!(
                "no {} permission on {kind} '{}'",
                ctx.permission,
                entity.get_str(fields::ID).unwrap_or_default()
            ),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Group;

    fn study() -> Study {
        let mut study = Study::new("st", "owner");
        study.groups = vec![
            Group {
                id: MEMBERS.to_string(),
                user_ids: vec!["alice".into(), "bob".into(), "carol".into()],
            },
            Group {
                id: ADMINS.to_string(),
                user_ids: vec!["admin".into()],
            },
            Group {
                id: "@analysts".to_string(),
                user_ids: vec!["bob".into()],
            },
        ];
        study.acl = vec!["alice__VIEW_SAMPLES".into(), "@analysts__VIEW_SAMPLES".into()];
        study
    }

    fn entity(acl: &[&str]) -> Document {
        Document::new().with("id", "S1").with(
            "_acl",
            acl.iter().map(|s| (*s).to_string()).collect::<Vec<_>>(),
        )
    }

    #[test]
    fn owners_and_admins_are_unrestricted() {
        let study = study();
        for user in ["owner", "admin"] {
            let ctx = AuthorizationContext::new(user, "VIEW");
            assert_eq!(
                query_for_authorised_entries(&study, &ctx, EntityKind::Sample, true).unwrap(),
                None
            );
        }
    }

    #[test]
    fn strangers_are_rejected() {
        let ctx = AuthorizationContext::new("mallory", "VIEW");
        assert!(matches!(
            query_for_authorised_entries(&study(), &ctx, EntityKind::Sample, false),
            Err(CatalogError::Authorization { .. })
        ));
    }

    #[test]
    fn study_grant_without_entity_acls_needs_no_filter() {
        let ctx = AuthorizationContext::new("alice", "VIEW");
        assert_eq!(
            query_for_authorised_entries(&study(), &ctx, EntityKind::Sample, false).unwrap(),
            None
        );
    }

    #[test]
    fn entity_entries_override_the_study_grant() {
        let study = study();
        let alice = AuthorizationContext::new("alice", "VIEW");
        let filter = query_for_authorised_entries(&study, &alice, EntityKind::Sample, true)
            .unwrap()
            .unwrap();
        assert!(filter.matches(&entity(&[])));
        assert!(filter.matches(&entity(&["alice__VIEW"])));
        assert!(!filter.matches(&entity(&["alice__WRITE"])));
        // only entries for other members: the study grant applies
        assert!(filter.matches(&entity(&["dave__WRITE"])));
    }

    #[test]
    fn members_without_grant_see_only_shared_entities() {
        let study = study();
        let carol = AuthorizationContext::new("carol", "VIEW");
        let filter = query_for_authorised_entries(&study, &carol, EntityKind::Sample, true)
            .unwrap()
            .unwrap();
        assert!(!filter.matches(&entity(&[])));
        assert!(filter.matches(&entity(&["@members__VIEW"])));
        assert!(filter.matches(&entity(&["*__VIEW"])));
        assert!(!filter.matches(&entity(&["carol__WRITE", "*__VIEW"])));
    }

    #[test]
    fn group_grant_applies_through_membership() {
        let study = study();
        let bob = AuthorizationContext::new("bob", "VIEW");
        assert!(has_study_permission(&study, &bob, EntityKind::Sample));
        assert!(!has_study_permission(&study, &bob, EntityKind::File));
        assert!(check_entity_permission(&study, &entity(&[]), &bob, EntityKind::Sample).is_ok());
        assert!(
            check_entity_permission(&study, &entity(&["@analysts__NONE"]), &bob, EntityKind::Sample)
                .is_err()
        );
        assert!(check_entity_permission(&study, &entity(&[]), &bob, EntityKind::File).is_err());
    }
}
