mod common;

use quillsign_backend::roles::OrganisationMemberRole;
use uuid::Uuid;

struct Fixture {
    org_id: Uuid,
    owner_id: Uuid,
    owner_member_id: Uuid,
    users: Vec<Uuid>,
}

impl Fixture {
    async fn cleanup(self, pool: &sqlx::PgPool) {
        common::cleanup_test_org(pool, self.org_id).await;
        common::cleanup_test_user(pool, self.owner_id).await;
        for user_id in self.users {
            common::cleanup_test_user(pool, user_id).await;
        }
    }
}

/// Org with an owner; additional members are added per test.
async fn org_fixture(pool: &sqlx::PgPool, suffix: &str) -> Fixture {
    let owner_email = common::unique_email(&format!("{}-owner", suffix));
    let (owner_id, _) = common::create_test_user(pool, "Owner", &owner_email).await;
    let org_id = common::create_test_org(pool, owner_id, suffix).await;

    let owner_member_id: Uuid = sqlx::query_scalar(
        "SELECT id FROM organisation_members WHERE organisation_id = $1 AND user_id = $2",
    )
    .bind(org_id)
    .bind(owner_id)
    .fetch_one(pool)
    .await
    .unwrap();

    Fixture {
        org_id,
        owner_id,
        owner_member_id,
        users: Vec::new(),
    }
}

async fn member_with_token(
    app: &common::TestApp,
    org_id: Uuid,
    role: OrganisationMemberRole,
    suffix: &str,
) -> (Uuid, Uuid, String) {
    let email = common::unique_email(suffix);
    let (user_id, password) = common::create_test_user(&app.pool, "Test Member", &email).await;
    let member_id = common::add_member(&app.pool, org_id, user_id, role).await;
    let token = common::get_auth_token(app.addr, &email, &password).await;

    (user_id, member_id, token)
}

#[tokio::test]
async fn owner_member_row_cannot_be_deleted() {
    let Some(app) = common::setup_test_app().await else {
        return;
    };

    let mut fx = org_fixture(&app.pool, "del-owner").await;
    let (admin_id, _, token) =
        member_with_token(&app, fx.org_id, OrganisationMemberRole::Admin, "del-owner-admin").await;
    fx.users.push(admin_id);

    // Even a full admin cannot target the owner's row.
    let resp = common::http_client()
        .delete(format!("http://{}/api/organisations/{}/members", app.addr, fx.org_id))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({ "member_ids": [fx.owner_member_id] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    let remaining: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM organisation_members WHERE id = $1",
    )
    .bind(fx.owner_member_id)
    .fetch_one(&app.pool)
    .await
    .unwrap();
    assert_eq!(remaining, 1, "Owner row must survive");

    fx.cleanup(&app.pool).await;
}

#[tokio::test]
async fn manager_cannot_update_admin() {
    let Some(app) = common::setup_test_app().await else {
        return;
    };

    let mut fx = org_fixture(&app.pool, "mgr-vs-admin").await;
    let (manager_id, _, token) =
        member_with_token(&app, fx.org_id, OrganisationMemberRole::Manager, "mgr-actor").await;
    fx.users.push(manager_id);

    let admin_email = common::unique_email("mgr-target-admin");
    let (admin_id, _) = common::create_test_user(&app.pool, "Admin Target", &admin_email).await;
    let admin_member_id =
        common::add_member(&app.pool, fx.org_id, admin_id, OrganisationMemberRole::Admin).await;
    fx.users.push(admin_id);

    let resp = common::http_client()
        .patch(format!(
            "http://{}/api/organisations/{}/members/{}",
            app.addr, fx.org_id, admin_member_id
        ))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({ "role": "member" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403, "Manager outranked by admin target");

    fx.cleanup(&app.pool).await;
}

#[tokio::test]
async fn manager_cannot_promote_beyond_own_role() {
    let Some(app) = common::setup_test_app().await else {
        return;
    };

    let mut fx = org_fixture(&app.pool, "mgr-promote").await;
    let (manager_id, _, token) =
        member_with_token(&app, fx.org_id, OrganisationMemberRole::Manager, "promote-actor").await;
    fx.users.push(manager_id);

    let target_email = common::unique_email("promote-target");
    let (target_id, _) = common::create_test_user(&app.pool, "Plain Member", &target_email).await;
    let target_member_id =
        common::add_member(&app.pool, fx.org_id, target_id, OrganisationMemberRole::Member).await;
    fx.users.push(target_id);

    // The manager may manage this member, but the proposed role exceeds the
    // manager's own ceiling.
    let resp = common::http_client()
        .patch(format!(
            "http://{}/api/organisations/{}/members/{}",
            app.addr, fx.org_id, target_member_id
        ))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({ "role": "admin" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    // Promoting within the ceiling works.
    let resp = common::http_client()
        .patch(format!(
            "http://{}/api/organisations/{}/members/{}",
            app.addr, fx.org_id, target_member_id
        ))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({ "role": "manager" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["role"].as_str().unwrap(), "manager");

    fx.cleanup(&app.pool).await;
}

#[tokio::test]
async fn manager_cannot_delete_admin() {
    let Some(app) = common::setup_test_app().await else {
        return;
    };

    let mut fx = org_fixture(&app.pool, "mgr-del-admin").await;
    let (manager_id, _, token) =
        member_with_token(&app, fx.org_id, OrganisationMemberRole::Manager, "mgr-del-actor").await;
    fx.users.push(manager_id);

    let admin_email = common::unique_email("mgr-del-target");
    let (admin_id, _) = common::create_test_user(&app.pool, "Admin Target", &admin_email).await;
    let admin_member_id =
        common::add_member(&app.pool, fx.org_id, admin_id, OrganisationMemberRole::Admin).await;
    fx.users.push(admin_id);

    // A single outranking target rejects the whole batch.
    let resp = common::http_client()
        .delete(format!("http://{}/api/organisations/{}/members", app.addr, fx.org_id))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({ "member_ids": [admin_member_id] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403, "Manager outranked by admin target");

    let remaining: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM organisation_members WHERE id = $1",
    )
    .bind(admin_member_id)
    .fetch_one(&app.pool)
    .await
    .unwrap();
    assert_eq!(remaining, 1, "Admin row must survive");

    fx.cleanup(&app.pool).await;
}

#[tokio::test]
async fn owner_role_cannot_be_changed() {
    let Some(app) = common::setup_test_app().await else {
        return;
    };

    let mut fx = org_fixture(&app.pool, "owner-role").await;
    let (admin_id, _, token) =
        member_with_token(&app, fx.org_id, OrganisationMemberRole::Admin, "owner-role-admin").await;
    fx.users.push(admin_id);

    let resp = common::http_client()
        .patch(format!(
            "http://{}/api/organisations/{}/members/{}",
            app.addr, fx.org_id, fx.owner_member_id
        ))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({ "role": "member" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    fx.cleanup(&app.pool).await;
}

#[tokio::test]
async fn delete_members_removes_targeted_rows() {
    let Some(app) = common::setup_test_app().await else {
        return;
    };

    let mut fx = org_fixture(&app.pool, "del-batch").await;
    let (admin_id, _, token) =
        member_with_token(&app, fx.org_id, OrganisationMemberRole::Admin, "del-batch-admin").await;
    fx.users.push(admin_id);

    let mut target_member_ids = Vec::new();
    for i in 0..2 {
        let email = common::unique_email(&format!("del-batch-{}", i));
        let (user_id, _) = common::create_test_user(&app.pool, "Batch Member", &email).await;
        let member_id =
            common::add_member(&app.pool, fx.org_id, user_id, OrganisationMemberRole::Member).await;
        fx.users.push(user_id);
        target_member_ids.push(member_id);
    }

    // One stale id in the batch is ignored.
    let mut ids = target_member_ids.clone();
    ids.push(Uuid::new_v4());

    let resp = common::http_client()
        .delete(format!("http://{}/api/organisations/{}/members", app.addr, fx.org_id))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({ "member_ids": ids }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let remaining: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM organisation_members WHERE id = ANY($1)",
    )
    .bind(&target_member_ids)
    .fetch_one(&app.pool)
    .await
    .unwrap();
    assert_eq!(remaining, 0);

    fx.cleanup(&app.pool).await;
}

#[tokio::test]
async fn plain_member_can_list_but_not_delete_members() {
    let Some(app) = common::setup_test_app().await else {
        return;
    };

    let mut fx = org_fixture(&app.pool, "member-list").await;
    let (member_id, own_member_id, token) =
        member_with_token(&app, fx.org_id, OrganisationMemberRole::Member, "list-member").await;
    fx.users.push(member_id);

    let resp = common::http_client()
        .get(format!("http://{}/api/organisations/{}/members", app.addr, fx.org_id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200, "Any member may list the roster");

    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["count"].as_i64().unwrap(), 2);

    let resp = common::http_client()
        .delete(format!("http://{}/api/organisations/{}/members", app.addr, fx.org_id))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({ "member_ids": [own_member_id] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404, "Plain members cannot manage the roster");

    fx.cleanup(&app.pool).await;
}
