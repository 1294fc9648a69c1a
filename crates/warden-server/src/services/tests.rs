//! Service-layer integration tests against an in-memory store and a
//! recording agent channel.

use uuid::Uuid;

use warden_common::models::*;
use warden_common::Capacity;

use crate::agent::AgentCommandKind;
use crate::services::*;
use crate::test_helpers::{test_node, test_state};
use crate::AppState;

async fn make_subnet4(state: &AppState, prefix: &str) -> Subnet4 {
    let mut subnet = Subnet4::new(prefix.parse().unwrap());
    subnet.nodes = vec!["node-a".to_string()];
    subnet4::create(state, subnet).await.unwrap()
}

async fn make_subnet6(state: &AppState, prefix: &str, eui64: bool) -> Subnet6 {
    let mut subnet = Subnet6::new(prefix.parse().unwrap(), eui64);
    subnet.nodes = vec!["node-a".to_string()];
    subnet6::create(state, subnet).await.unwrap()
}

fn reservation4(subnet_id: Uuid, mac: &str, ip: &str) -> Reservation4 {
    Reservation4 {
        id: Uuid::now_v7(),
        subnet_id,
        hw_address: Some(mac.to_string()),
        hostname: None,
        ip_address: ip.parse().unwrap(),
        comment: None,
        created_at: chrono::Utc::now(),
        updated_at: chrono::Utc::now(),
    }
}

#[tokio::test]
async fn test_v4_capacity_end_to_end() {
    let (state, _channel) = test_state().await;
    let subnet = make_subnet4(&state, "10.0.0.0/24").await;
    assert_eq!(subnet.capacity, 0);
    assert_eq!(subnet.subnet_id, 1);

    let pool = pool4::create(
        &state,
        Pool4::new(
            subnet.id,
            "10.0.0.10".parse().unwrap(),
            "10.0.0.200".parse().unwrap(),
        ),
    )
    .await
    .unwrap();
    assert_eq!(pool.capacity, 191);
    assert_eq!(subnet4::get(&state, subnet.id).await.unwrap().capacity, 191);

    let reserved = reserved_pool4::create(
        &state,
        ReservedPool4::new(
            subnet.id,
            "10.0.0.50".parse().unwrap(),
            "10.0.0.59".parse().unwrap(),
        ),
    )
    .await
    .unwrap();
    assert_eq!(pool4::get(&state, pool.id).await.unwrap().capacity, 181);
    assert_eq!(subnet4::get(&state, subnet.id).await.unwrap().capacity, 181);

    reserved_pool4::delete(&state, reserved.id).await.unwrap();
    assert_eq!(pool4::get(&state, pool.id).await.unwrap().capacity, 191);
    assert_eq!(subnet4::get(&state, subnet.id).await.unwrap().capacity, 191);

    pool4::delete(&state, pool.id).await.unwrap();
    assert_eq!(subnet4::get(&state, subnet.id).await.unwrap().capacity, 0);
}

#[tokio::test]
async fn test_pd_pool_capacity_end_to_end() {
    let (state, _channel) = test_state().await;
    let subnet = make_subnet6(&state, "2001:db8::/48", false).await;

    let pd = pd_pool::create(
        &state,
        PdPool::new(subnet.id, "2001:db8::/56".parse().unwrap(), 64),
    )
    .await
    .unwrap();
    assert_eq!(pd.capacity, Capacity::Bounded(256));

    let reserved = reserved_pd_pool::create(
        &state,
        ReservedPdPool::new(subnet.id, "2001:db8:0:10::/60".parse().unwrap(), 64),
    )
    .await
    .unwrap();
    assert_eq!(
        pd_pool::get(&state, pd.id).await.unwrap().capacity,
        Capacity::Bounded(240)
    );
    assert_eq!(
        subnet6::get(&state, subnet.id).await.unwrap().capacity,
        Capacity::Bounded(240)
    );

    reserved_pd_pool::delete(&state, reserved.id).await.unwrap();
    assert_eq!(
        pd_pool::get(&state, pd.id).await.unwrap().capacity,
        Capacity::Bounded(256)
    );
    assert_eq!(
        subnet6::get(&state, subnet.id).await.unwrap().capacity,
        Capacity::Bounded(256)
    );
}

#[tokio::test]
async fn test_subnet_ids_shared_across_families() {
    let (state, _channel) = test_state().await;
    let s4 = make_subnet4(&state, "10.0.0.0/24").await;
    let s6 = make_subnet6(&state, "2001:db8::/48", false).await;
    let s4b = make_subnet4(&state, "10.1.0.0/24").await;
    assert_eq!(s4.subnet_id, 1);
    assert_eq!(s6.subnet_id, 2);
    assert_eq!(s4b.subnet_id, 3);
}

#[tokio::test]
async fn test_pool_outside_subnet_rejected() {
    let (state, _channel) = test_state().await;
    let subnet = make_subnet4(&state, "10.0.0.0/24").await;
    let err = pool4::create(
        &state,
        Pool4::new(
            subnet.id,
            "10.0.0.250".parse().unwrap(),
            "10.0.1.10".parse().unwrap(),
        ),
    )
    .await
    .unwrap_err();
    assert!(err.is_validation());
}

#[tokio::test]
async fn test_overlapping_pool_rejected() {
    let (state, _channel) = test_state().await;
    let subnet = make_subnet4(&state, "10.0.0.0/24").await;
    pool4::create(
        &state,
        Pool4::new(
            subnet.id,
            "10.0.0.10".parse().unwrap(),
            "10.0.0.100".parse().unwrap(),
        ),
    )
    .await
    .unwrap();

    let err = pool4::create(
        &state,
        Pool4::new(
            subnet.id,
            "10.0.0.90".parse().unwrap(),
            "10.0.0.120".parse().unwrap(),
        ),
    )
    .await
    .unwrap_err();
    assert!(err.is_conflict());
}

#[tokio::test]
async fn test_overlapping_subnet_rejected() {
    let (state, _channel) = test_state().await;
    make_subnet4(&state, "10.0.0.0/16").await;
    let mut candidate = Subnet4::new("10.0.5.0/24".parse().unwrap());
    candidate.nodes = vec!["node-a".to_string()];
    let err = subnet4::create(&state, candidate).await.unwrap_err();
    assert!(err.is_conflict());
}

#[tokio::test]
async fn test_reservation4_capacity_and_uniqueness() {
    let (state, _channel) = test_state().await;
    let subnet = make_subnet4(&state, "10.0.0.0/24").await;
    let pool = pool4::create(
        &state,
        Pool4::new(
            subnet.id,
            "10.0.0.10".parse().unwrap(),
            "10.0.0.100".parse().unwrap(),
        ),
    )
    .await
    .unwrap();

    let r = reservation4::create(&state, reservation4(subnet.id, "aa:bb:cc:00:00:01", "10.0.0.20"))
        .await
        .unwrap();
    assert_eq!(pool4::get(&state, pool.id).await.unwrap().capacity, 90);
    assert_eq!(subnet4::get(&state, subnet.id).await.unwrap().capacity, 90);

    // Same MAC again, different address.
    let err = reservation4::create(
        &state,
        reservation4(subnet.id, "aa:bb:cc:00:00:01", "10.0.0.21"),
    )
    .await
    .unwrap_err();
    assert!(err.is_conflict());

    // Same address again, different MAC.
    let err = reservation4::create(
        &state,
        reservation4(subnet.id, "aa:bb:cc:00:00:02", "10.0.0.20"),
    )
    .await
    .unwrap_err();
    assert!(err.is_conflict());

    reservation4::delete(&state, r.id).await.unwrap();
    assert_eq!(pool4::get(&state, pool.id).await.unwrap().capacity, 91);
    assert_eq!(subnet4::get(&state, subnet.id).await.unwrap().capacity, 91);
}

#[tokio::test]
async fn test_reserved_pool_rejects_covered_reservation() {
    let (state, _channel) = test_state().await;
    let subnet = make_subnet4(&state, "10.0.0.0/24").await;
    pool4::create(
        &state,
        Pool4::new(
            subnet.id,
            "10.0.0.10".parse().unwrap(),
            "10.0.0.200".parse().unwrap(),
        ),
    )
    .await
    .unwrap();
    reservation4::create(&state, reservation4(subnet.id, "aa:bb:cc:00:00:01", "10.0.0.55"))
        .await
        .unwrap();

    let err = reserved_pool4::create(
        &state,
        ReservedPool4::new(
            subnet.id,
            "10.0.0.50".parse().unwrap(),
            "10.0.0.59".parse().unwrap(),
        ),
    )
    .await
    .unwrap_err();
    assert!(err.is_conflict());
}

#[tokio::test]
async fn test_batch_with_duplicate_persists_nothing() {
    let (state, _channel) = test_state().await;
    let subnet = make_subnet4(&state, "10.0.0.0/24").await;
    pool4::create(
        &state,
        Pool4::new(
            subnet.id,
            "10.0.0.10".parse().unwrap(),
            "10.0.0.200".parse().unwrap(),
        ),
    )
    .await
    .unwrap();

    let batch = vec![
        reservation4(subnet.id, "aa:bb:cc:00:00:01", "10.0.0.20"),
        reservation4(subnet.id, "aa:bb:cc:00:00:02", "10.0.0.21"),
        // Duplicate MAC of the first item.
        reservation4(subnet.id, "aa:bb:cc:00:00:01", "10.0.0.22"),
    ];
    let err = reservation4::batch_create(&state, batch).await.unwrap_err();
    assert!(err.is_conflict());

    assert!(reservation4::list(&state, subnet.id)
        .await
        .unwrap()
        .is_empty());
    assert_eq!(subnet4::get(&state, subnet.id).await.unwrap().capacity, 191);
}

#[tokio::test]
async fn test_reserved_range_exceeding_capacity_rejected() {
    let (state, _channel) = test_state().await;
    let subnet = make_subnet4(&state, "10.0.0.0/24").await;

    // No pools: the subnet has nothing to charge. A clamped-at-zero create
    // followed by a delete would mint capacity out of thin air.
    let err = reserved_pool4::create(
        &state,
        ReservedPool4::new(
            subnet.id,
            "10.0.0.50".parse().unwrap(),
            "10.0.0.59".parse().unwrap(),
        ),
    )
    .await
    .unwrap_err();
    assert!(err.is_validation());
    assert!(reserved_pool4::list(&state, subnet.id)
        .await
        .unwrap()
        .is_empty());
    assert_eq!(subnet4::get(&state, subnet.id).await.unwrap().capacity, 0);

    // Out-of-pool reservations hit the same wall.
    let err =
        reservation4::create(&state, reservation4(subnet.id, "aa:bb:cc:00:00:01", "10.0.0.5"))
            .await
            .unwrap_err();
    assert!(err.is_validation());

    // Once a pool funds the subnet, the same out-of-pool range is accepted
    // and the create/delete round-trip restores the counter exactly.
    let pool = pool4::create(
        &state,
        Pool4::new(
            subnet.id,
            "10.0.0.10".parse().unwrap(),
            "10.0.0.40".parse().unwrap(),
        ),
    )
    .await
    .unwrap();
    assert_eq!(pool.capacity, 31);
    let reserved = reserved_pool4::create(
        &state,
        ReservedPool4::new(
            subnet.id,
            "10.0.0.50".parse().unwrap(),
            "10.0.0.59".parse().unwrap(),
        ),
    )
    .await
    .unwrap();
    assert_eq!(subnet4::get(&state, subnet.id).await.unwrap().capacity, 21);
    reserved_pool4::delete(&state, reserved.id).await.unwrap();
    assert_eq!(subnet4::get(&state, subnet.id).await.unwrap().capacity, 31);
    assert_eq!(pool4::get(&state, pool.id).await.unwrap().capacity, 31);

    // The delegation side enforces the same precondition.
    let subnet6 = make_subnet6(&state, "2001:db8::/56", false).await;
    let err = reserved_pd_pool::create(
        &state,
        ReservedPdPool::new(subnet6.id, "2001:db8:0:10::/60".parse().unwrap(), 64),
    )
    .await
    .unwrap_err();
    assert!(err.is_validation());
    assert_eq!(
        subnet6::get(&state, subnet6.id).await.unwrap().capacity,
        Capacity::ZERO
    );
}

#[tokio::test]
async fn test_notify_failure_rolls_back_store() {
    let (state, channel) = test_state().await;
    let subnet = make_subnet4(&state, "10.0.0.0/24").await;

    channel.fail_node("node-a");
    let err = pool4::create(
        &state,
        Pool4::new(
            subnet.id,
            "10.0.0.10".parse().unwrap(),
            "10.0.0.100".parse().unwrap(),
        ),
    )
    .await
    .unwrap_err();
    assert!(matches!(err.kind, warden_common::ErrorKind::Agent(_)));

    // Neither the pool row nor the capacity bump survived.
    assert!(pool4::list(&state, subnet.id).await.unwrap().is_empty());
    assert_eq!(subnet4::get(&state, subnet.id).await.unwrap().capacity, 0);
}

#[tokio::test]
async fn test_partial_dispatch_sends_compensation() {
    let (state, channel) = test_state().await;
    state.nodes.upsert(test_node("node-b"));
    channel.fail_node("node-b");

    let mut subnet = Subnet4::new("10.0.0.0/24".parse().unwrap());
    subnet.nodes = vec!["node-a".to_string(), "node-b".to_string()];
    let err = subnet4::create(&state, subnet).await.unwrap_err();
    assert!(matches!(err.kind, warden_common::ErrorKind::Agent(_)));

    let sent = channel.sent_kinds();
    assert_eq!(
        sent,
        vec![
            ("node-a".to_string(), AgentCommandKind::CreateSubnet4),
            ("node-a".to_string(), AgentCommandKind::DeleteSubnet4),
        ]
    );
    assert!(subnet4::list(&state).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_live_leases_block_delete() {
    let (state, channel) = test_state().await;
    let subnet = make_subnet4(&state, "10.0.0.0/24").await;
    let pool = pool4::create(
        &state,
        Pool4::new(
            subnet.id,
            "10.0.0.10".parse().unwrap(),
            "10.0.0.100".parse().unwrap(),
        ),
    )
    .await
    .unwrap();

    channel.set_lease_count(3);
    let err = pool4::delete(&state, pool.id).await.unwrap_err();
    assert!(err.is_in_use());
    assert!(pool4::get(&state, pool.id).await.is_ok());

    channel.set_lease_count(0);
    pool4::delete(&state, pool.id).await.unwrap();
}

#[tokio::test]
async fn test_eui64_subnet_rejects_reservations_and_pd_pools() {
    let (state, _channel) = test_state().await;
    let subnet = make_subnet6(&state, "2001:db8::/64", true).await;
    assert!(subnet.capacity.is_unbounded());

    let r = Reservation6 {
        id: Uuid::now_v7(),
        subnet_id: subnet.id,
        duid: Some("000300011234".to_string()),
        hw_address: None,
        hostname: None,
        ip_addresses: vec!["2001:db8::10".parse().unwrap()],
        prefixes: vec![],
        comment: None,
        created_at: chrono::Utc::now(),
        updated_at: chrono::Utc::now(),
    };
    let err = reservation6::create(&state, r).await.unwrap_err();
    assert!(err.is_validation());

    let err = pd_pool::create(
        &state,
        PdPool::new(subnet.id, "2001:db8::/64".parse().unwrap(), 80),
    )
    .await
    .unwrap_err();
    assert!(err.is_validation());
}

#[tokio::test]
async fn test_client_class_delete_blocked_while_referenced() {
    let (state, _channel) = test_state().await;
    let class = client_class::create(
        &state,
        ClientClass::new("iot".to_string(), 60, MatchRule::Contains("cam".into())),
    )
    .await
    .unwrap();

    let mut subnet = Subnet4::new("10.0.0.0/24".parse().unwrap());
    subnet.nodes = vec!["node-a".to_string()];
    subnet.client_class_whitelist = vec!["iot".to_string()];
    let subnet = subnet4::create(&state, subnet).await.unwrap();

    let err = client_class::delete(&state, class.id).await.unwrap_err();
    assert!(err.is_in_use());

    subnet4::delete(&state, subnet.id).await.unwrap();
    client_class::delete(&state, class.id).await.unwrap();
}

#[tokio::test]
async fn test_unknown_client_class_rejected() {
    let (state, _channel) = test_state().await;
    let mut subnet = Subnet4::new("10.0.0.0/24".parse().unwrap());
    subnet.nodes = vec!["node-a".to_string()];
    subnet.client_class_blacklist = vec!["ghost".to_string()];
    let err = subnet4::create(&state, subnet).await.unwrap_err();
    assert!(err.is_validation());
}

#[tokio::test]
async fn test_shared_network_blocks_subnet_delete() {
    let (state, _channel) = test_state().await;
    let subnet = make_subnet4(&state, "10.0.0.0/24").await;

    let network = shared_network::create(
        &state,
        SharedNetwork {
            id: Uuid::now_v7(),
            name: "campus".to_string(),
            subnet_ids: vec![subnet.subnet_id],
            comment: None,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        },
    )
    .await
    .unwrap();

    let err = subnet4::delete(&state, subnet.id).await.unwrap_err();
    assert!(err.is_in_use());

    shared_network::delete(&state, network.id).await.unwrap();
    subnet4::delete(&state, subnet.id).await.unwrap();
}

#[tokio::test]
async fn test_subnet_delete_cascades_children() {
    let (state, _channel) = test_state().await;
    let subnet = make_subnet4(&state, "10.0.0.0/24").await;
    pool4::create(
        &state,
        Pool4::new(
            subnet.id,
            "10.0.0.10".parse().unwrap(),
            "10.0.0.100".parse().unwrap(),
        ),
    )
    .await
    .unwrap();
    reservation4::create(&state, reservation4(subnet.id, "aa:bb:cc:00:00:01", "10.0.0.200"))
        .await
        .unwrap();

    subnet4::delete(&state, subnet.id).await.unwrap();
    assert!(pool4::list(&state, subnet.id).await.unwrap().is_empty());
    assert!(reservation4::list(&state, subnet.id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_admit_list_pushed_to_all_roles() {
    let (state, channel) = test_state().await;
    admit::create_admit_mac(
        &state,
        AdmitMac {
            id: Uuid::now_v7(),
            hw_address: "aa:bb:cc:dd:ee:ff".to_string(),
            comment: None,
            created_at: chrono::Utc::now(),
        },
    )
    .await
    .unwrap();

    let sent = channel.sent_kinds();
    assert_eq!(
        sent,
        vec![("node-a".to_string(), AgentCommandKind::UpdateAdmitList)]
    );
}

#[tokio::test]
async fn test_reservation6_claims_and_duplicates() {
    let (state, _channel) = test_state().await;
    let subnet = make_subnet6(&state, "2001:db8::/48", false).await;
    let pool = pool6::create(
        &state,
        Pool6::new(
            subnet.id,
            "2001:db8::10".parse().unwrap(),
            "2001:db8::ff".parse().unwrap(),
        ),
    )
    .await
    .unwrap();
    assert_eq!(pool.capacity, Capacity::Bounded(240));

    let r = Reservation6 {
        id: Uuid::now_v7(),
        subnet_id: subnet.id,
        duid: Some("000300011234".to_string()),
        hw_address: None,
        hostname: None,
        ip_addresses: vec!["2001:db8::10".parse().unwrap()],
        prefixes: vec!["2001:db8:0:10::/64".parse().unwrap()],
        comment: None,
        created_at: chrono::Utc::now(),
        updated_at: chrono::Utc::now(),
    };
    reservation6::create(&state, r.clone()).await.unwrap();
    // One in-pool address and one prefix: two claims against the subnet,
    // one against the pool.
    assert_eq!(
        subnet6::get(&state, subnet.id).await.unwrap().capacity,
        Capacity::Bounded(238)
    );
    assert_eq!(
        pool6::get(&state, pool.id).await.unwrap().capacity,
        Capacity::Bounded(239)
    );

    // Same DUID rejected.
    let mut dup = r.clone();
    dup.id = Uuid::now_v7();
    dup.ip_addresses = vec!["2001:db8::11".parse().unwrap()];
    dup.prefixes = vec![];
    let err = reservation6::create(&state, dup).await.unwrap_err();
    assert!(err.is_conflict());
}
