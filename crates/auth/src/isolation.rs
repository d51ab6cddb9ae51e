//! Tenant isolation enforcement for data access.
//!
//! Every table is classified in an explicit policy table. Handlers ask the
//! filter for a scoping decision before reading, and run insert scoping
//! before writing; a tenant-scoped row is never written with a tenant id the
//! caller supplied unless the caller is a system administrator.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use tenantry_core::TenantId;

use crate::user::User;
use crate::{AuthError, AuthResult, AuthorizationContext};

/// Column carrying the owning tenant on tenant-scoped tables.
pub const TENANT_COLUMN: &str = "tenant_id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TableClass {
    /// Rows belong to exactly one tenant.
    TenantScoped,
    /// Only system administrators may touch these tables.
    SystemOnly,
    /// Link tables; access is controlled through the tables they join.
    Junction,
    /// Not listed in the policy. Treated like `Junction`.
    Unclassified,
}

/// Built-in classification of the administrative schema.
pub const DEFAULT_TABLE_POLICY: &[(&str, TableClass)] = &[
    ("users", TableClass::TenantScoped),
    ("roles", TableClass::TenantScoped),
    ("audit_logs", TableClass::TenantScoped),
    ("data_imports", TableClass::TenantScoped),
    ("data_exports", TableClass::TenantScoped),
    ("tenants", TableClass::SystemOnly),
    ("permissions", TableClass::SystemOnly),
    ("user_roles", TableClass::Junction),
    ("role_permissions", TableClass::Junction),
];

/// Explicit table → class mapping. Adding a table is one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TablePolicy {
    entries: HashMap<String, TableClass>,
}

impl TablePolicy {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, TableClass)>,
        S: Into<String>,
    {
        Self {
            entries: entries.into_iter().map(|(t, c)| (t.into(), c)).collect(),
        }
    }

    pub fn with_table(mut self, table: impl Into<String>, class: TableClass) -> Self {
        self.entries.insert(table.into(), class);
        self
    }

    pub fn classify(&self, table: &str) -> TableClass {
        self.entries
            .get(table)
            .copied()
            .unwrap_or(TableClass::Unclassified)
    }

    /// Tables of a given class, sorted.
    pub fn tables(&self, class: TableClass) -> Vec<&str> {
        let mut tables: Vec<&str> = self
            .entries
            .iter()
            .filter(|(_, c)| **c == class)
            .map(|(t, _)| t.as_str())
            .collect();
        tables.sort_unstable();
        tables
    }
}

impl Default for TablePolicy {
    fn default() -> Self {
        Self::new(DEFAULT_TABLE_POLICY.iter().copied())
    }
}

/// A tenant predicate to attach to a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TenantFilter {
    pub column: &'static str,
    pub tenant_id: TenantId,
}

impl TenantFilter {
    /// SQL fragment with a positional placeholder; bind `tenant_id` at `$n`.
    pub fn sql_predicate(&self, placeholder: usize) -> String {
        format!("{} = ${placeholder}", self.column)
    }
}

/// Outcome of [`TenantIsolationFilter::scope`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeDecision {
    /// Apply `tenant_id = X`.
    Filter(TenantFilter),
    /// No tenant predicate.
    Unfiltered,
}

impl ScopeDecision {
    fn tenant(tenant_id: TenantId) -> Self {
        ScopeDecision::Filter(TenantFilter {
            column: TENANT_COLUMN,
            tenant_id,
        })
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        match self {
            ScopeDecision::Filter(f) => Some(f.tenant_id),
            ScopeDecision::Unfiltered => None,
        }
    }
}

/// A record whose tenant column can be read and forced.
pub trait TenantScopedRecord {
    fn tenant_id(&self) -> Option<TenantId>;
    fn set_tenant_id(&mut self, tenant_id: TenantId);
}

/// JSON payloads: the tenant lives under `"tenant_id"` as a UUID string.
/// A missing or unparsable value reads as `None`.
impl TenantScopedRecord for Map<String, Value> {
    fn tenant_id(&self) -> Option<TenantId> {
        self.get(TENANT_COLUMN)
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())
    }

    fn set_tenant_id(&mut self, tenant_id: TenantId) {
        self.insert(
            TENANT_COLUMN.to_string(),
            Value::String(tenant_id.to_string()),
        );
    }
}

impl TenantScopedRecord for User {
    fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    fn set_tenant_id(&mut self, tenant_id: TenantId) {
        self.tenant_id = Some(tenant_id);
    }
}

/// Enforces the tenant boundary on reads and writes.
#[derive(Debug, Clone, Default)]
pub struct TenantIsolationFilter {
    policy: TablePolicy,
}

impl TenantIsolationFilter {
    pub fn new(policy: TablePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &TablePolicy {
        &self.policy
    }

    /// Decide how a query against `table` must be scoped for this caller.
    ///
    /// `ctx == None` means the caller has no usable identity.
    pub fn scope(
        &self,
        ctx: Option<&AuthorizationContext>,
        table: &str,
    ) -> AuthResult<ScopeDecision> {
        match self.policy.classify(table) {
            TableClass::Junction | TableClass::Unclassified => Ok(ScopeDecision::Unfiltered),
            TableClass::SystemOnly => {
                let ctx = ctx.ok_or(AuthError::UnauthorizedTenant)?;
                if ctx.is_system_admin() {
                    Ok(ScopeDecision::Unfiltered)
                } else {
                    warn!(user_id = %ctx.user_id(), table, "non-admin access to system table");
                    Err(AuthError::UnauthorizedTenant)
                }
            }
            TableClass::TenantScoped => {
                let ctx = ctx.ok_or(AuthError::UnauthorizedTenant)?;
                match (ctx.is_system_admin(), ctx.tenant_id()) {
                    (true, _) => {
                        debug!(user_id = %ctx.user_id(), table, "system admin query, no tenant filter");
                        Ok(ScopeDecision::Unfiltered)
                    }
                    (false, Some(tenant_id)) => Ok(ScopeDecision::tenant(tenant_id)),
                    (false, None) => Err(AuthError::TenantRequired),
                }
            }
        }
    }

    /// Like [`scope`](Self::scope), but for a query aimed at one specific
    /// tenant. Admins get a filter on the requested tenant (so the target is
    /// recorded); everyone else must be asking for their own tenant.
    pub fn scope_for(
        &self,
        ctx: Option<&AuthorizationContext>,
        table: &str,
        requested: TenantId,
    ) -> AuthResult<ScopeDecision> {
        match self.scope(ctx, table)? {
            ScopeDecision::Filter(filter) if filter.tenant_id != requested => {
                warn!(
                    own_tenant = %filter.tenant_id,
                    requested_tenant = %requested,
                    table,
                    "cross-tenant query rejected"
                );
                Err(AuthError::UnauthorizedTenant)
            }
            ScopeDecision::Unfiltered if self.policy.classify(table) == TableClass::TenantScoped => {
                info!(target_tenant = %requested, table, "system admin query targeting tenant");
                Ok(ScopeDecision::tenant(requested))
            }
            decision => Ok(decision),
        }
    }

    /// Check that the caller may act on a resource owned by `target`.
    pub fn validate_access(&self, ctx: &AuthorizationContext, target: TenantId) -> AuthResult<()> {
        if ctx.is_system_admin() {
            return Ok(());
        }
        if ctx.tenant_id() == Some(target) {
            return Ok(());
        }

        warn!(
            user_id = %ctx.user_id(),
            own_tenant = ?ctx.tenant_id(),
            target_tenant = %target,
            "cross-tenant access rejected"
        );
        Err(AuthError::UnauthorizedTenant)
    }

    /// Force the tenant column of a record about to be written to `table`.
    ///
    /// Non-admin callers always get their own tenant written, whatever the
    /// payload said. System admins choose the target tenant, but must name one.
    pub fn apply_insert_scoping<R>(
        &self,
        ctx: Option<&AuthorizationContext>,
        record: &mut R,
        table: &str,
    ) -> AuthResult<()>
    where
        R: TenantScopedRecord + ?Sized,
    {
        match self.policy.classify(table) {
            TableClass::Junction | TableClass::Unclassified => Ok(()),
            TableClass::SystemOnly => {
                let ctx = ctx.ok_or(AuthError::UnauthorizedTenant)?;
                if ctx.is_system_admin() {
                    Ok(())
                } else {
                    warn!(user_id = %ctx.user_id(), table, "non-admin write to system table");
                    Err(AuthError::UnauthorizedTenant)
                }
            }
            TableClass::TenantScoped => {
                let ctx = ctx.ok_or(AuthError::UnauthorizedTenant)?;
                if ctx.is_system_admin() {
                    let target = record.tenant_id().ok_or(AuthError::TenantRequired)?;
                    info!(user_id = %ctx.user_id(), target_tenant = %target, table, "system admin insert");
                    return Ok(());
                }

                let own = ctx.tenant_id().ok_or(AuthError::TenantRequired)?;
                if let Some(claimed) = record.tenant_id().filter(|t| *t != own) {
                    warn!(
                        user_id = %ctx.user_id(),
                        claimed_tenant = %claimed,
                        own_tenant = %own,
                        table,
                        "overwriting client-supplied tenant id"
                    );
                }
                record.set_tenant_id(own);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde_json::json;

    use super::*;
    use crate::testing::{admin_context, tenant_context};
    use crate::user::Tenant;

    fn filter() -> TenantIsolationFilter {
        TenantIsolationFilter::default()
    }

    fn payload(value: serde_json::Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn default_policy_classification() {
        let policy = TablePolicy::default();
        assert_eq!(policy.classify("users"), TableClass::TenantScoped);
        assert_eq!(policy.classify("tenants"), TableClass::SystemOnly);
        assert_eq!(policy.classify("user_roles"), TableClass::Junction);
        assert_eq!(policy.classify("widgets"), TableClass::Unclassified);
        assert_eq!(policy.tables(TableClass::SystemOnly), vec!["permissions", "tenants"]);
    }

    #[test]
    fn adding_a_table_is_one_entry() {
        let f = TenantIsolationFilter::new(
            TablePolicy::default().with_table("invoices", TableClass::TenantScoped),
        );
        let tenant = Tenant::new("acme", "Acme");
        let ctx = tenant_context(&tenant, &["user"]);

        let decision = f.scope(Some(&ctx), "invoices").unwrap();
        assert_eq!(decision.tenant_id(), Some(tenant.id));
    }

    #[test]
    fn tenant_scoped_reads_filter_by_own_tenant() {
        let tenant = Tenant::new("acme", "Acme");
        let ctx = tenant_context(&tenant, &["user"]);

        let decision = filter().scope(Some(&ctx), "users").unwrap();
        let ScopeDecision::Filter(f) = decision else {
            panic!("expected a tenant filter");
        };
        assert_eq!(f.tenant_id, tenant.id);
        assert_eq!(f.sql_predicate(1), "tenant_id = $1");
    }

    #[test]
    fn admin_reads_unfiltered_but_targeted_reads_record_tenant() {
        let ctx = admin_context();
        let target = TenantId::new();

        assert_eq!(filter().scope(Some(&ctx), "users"), Ok(ScopeDecision::Unfiltered));
        assert_eq!(
            filter().scope_for(Some(&ctx), "users", target).unwrap().tenant_id(),
            Some(target)
        );
    }

    #[test]
    fn non_admin_targeting_other_tenant_is_rejected() {
        let tenant = Tenant::new("acme", "Acme");
        let ctx = tenant_context(&tenant, &["admin"]);

        assert_eq!(
            filter().scope_for(Some(&ctx), "roles", TenantId::new()),
            Err(AuthError::UnauthorizedTenant)
        );
        assert!(filter().scope_for(Some(&ctx), "roles", tenant.id).is_ok());
    }

    #[test]
    fn system_tables_are_admin_only() {
        let ctx = tenant_context(&Tenant::new("acme", "Acme"), &["admin"]);
        assert_eq!(
            filter().scope(Some(&ctx), "tenants"),
            Err(AuthError::UnauthorizedTenant)
        );
        assert_eq!(
            filter().scope(Some(&admin_context()), "permissions"),
            Ok(ScopeDecision::Unfiltered)
        );
    }

    #[test]
    fn missing_identity_is_rejected_except_for_junctions() {
        assert_eq!(filter().scope(None, "users"), Err(AuthError::UnauthorizedTenant));
        assert_eq!(filter().scope(None, "tenants"), Err(AuthError::UnauthorizedTenant));
        assert_eq!(filter().scope(None, "user_roles"), Ok(ScopeDecision::Unfiltered));
    }

    #[test]
    fn insert_scoping_overwrites_spoofed_tenant() {
        let tenant_a = Tenant::new("a", "A");
        let tenant_b = TenantId::new();
        let ctx = tenant_context(&tenant_a, &["admin"]);

        let mut record = payload(json!({ "name": "ops", "tenant_id": tenant_b.to_string() }));
        filter().apply_insert_scoping(Some(&ctx), &mut record, "roles").unwrap();

        assert_eq!(record.get("tenant_id"), Some(&json!(tenant_a.id.to_string())));
        assert_eq!(record.get("name"), Some(&json!("ops")));
    }

    #[test]
    fn insert_scoping_fills_missing_tenant() {
        let tenant = Tenant::new("a", "A");
        let ctx = tenant_context(&tenant, &["user"]);

        let mut record = payload(json!({ "action": "login", "tenant_id": 42 }));
        filter().apply_insert_scoping(Some(&ctx), &mut record, "audit_logs").unwrap();
        assert_eq!(TenantScopedRecord::tenant_id(&record), Some(tenant.id));
    }

    #[test]
    fn admin_insert_keeps_target_but_requires_one() {
        let ctx = admin_context();
        let target = TenantId::new();

        let mut record = payload(json!({ "tenant_id": target.to_string() }));
        filter().apply_insert_scoping(Some(&ctx), &mut record, "users").unwrap();
        assert_eq!(TenantScopedRecord::tenant_id(&record), Some(target));

        let mut untargeted = payload(json!({ "username": "x" }));
        assert_eq!(
            filter().apply_insert_scoping(Some(&ctx), &mut untargeted, "users"),
            Err(AuthError::TenantRequired)
        );
    }

    #[test]
    fn insert_scoping_works_on_typed_records() {
        let tenant = Tenant::new("a", "A");
        let ctx = tenant_context(&tenant, &["admin"]);

        let mut user = User::new(TenantId::new(), "eve", "eve@example.com", "h");
        filter().apply_insert_scoping(Some(&ctx), &mut user, "users").unwrap();
        assert_eq!(user.tenant_id, Some(tenant.id));
    }

    #[test]
    fn junction_writes_pass_through_untouched() {
        let ctx = tenant_context(&Tenant::new("a", "A"), &["user"]);
        let other = TenantId::new();
        let mut record = payload(json!({ "tenant_id": other.to_string() }));

        filter().apply_insert_scoping(Some(&ctx), &mut record, "user_roles").unwrap();
        assert_eq!(TenantScopedRecord::tenant_id(&record), Some(other));
    }

    proptest! {
        /// Property: a context scoped to A passes for A and fails for any B != A;
        /// a system admin passes for any tenant, existing or not.
        #[test]
        fn tenant_boundary(a in any::<u128>(), b in any::<u128>()) {
            prop_assume!(a != b);
            let mut tenant = Tenant::new("a", "A");
            tenant.id = TenantId::from_uuid(uuid::Uuid::from_u128(a));
            let other = TenantId::from_uuid(uuid::Uuid::from_u128(b));

            let ctx = tenant_context(&tenant, &["admin"]);
            prop_assert_eq!(filter().validate_access(&ctx, tenant.id), Ok(()));
            prop_assert_eq!(filter().validate_access(&ctx, other), Err(AuthError::UnauthorizedTenant));

            let admin = admin_context();
            prop_assert_eq!(filter().validate_access(&admin, other), Ok(()));
        }

        /// Property: for non-admins the written tenant is always their own.
        #[test]
        fn insert_scoping_cannot_be_spoofed(claimed in any::<u128>(), table_idx in 0usize..5) {
            let tables = ["users", "roles", "audit_logs", "data_imports", "data_exports"];
            let tenant = Tenant::new("a", "A");
            let ctx = tenant_context(&tenant, &["user"]);
            let claimed = TenantId::from_uuid(uuid::Uuid::from_u128(claimed));

            let mut record = payload(json!({ "tenant_id": claimed.to_string() }));
            filter().apply_insert_scoping(Some(&ctx), &mut record, tables[table_idx]).unwrap();
            prop_assert_eq!(TenantScopedRecord::tenant_id(&record), Some(tenant.id));
        }
    }
}
