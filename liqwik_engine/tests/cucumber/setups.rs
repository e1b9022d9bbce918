use cucumber::given;
use liqwik_engine::{
    db_types::Role,
    test_utils::{create_bill_to_party, create_user_with_role},
};

use crate::cucumber::{marketplace_world::MarketplaceSystem, MarketplaceWorld};

#[given("a fresh marketplace")]
async fn fresh_database(world: &mut MarketplaceWorld) {
    let system = MarketplaceSystem::new().await;
    world.system = Some(system);
}

#[given(expr = "a seller named {word}")]
async fn seller(world: &mut MarketplaceWorld, name: String) {
    let p = create_user_with_role(&world.sys().db, &name, Role::Seller).await;
    world.participants.insert(name, p);
}

#[given(expr = "a buyer named {word}")]
async fn buyer(world: &mut MarketplaceWorld, name: String) {
    let p = create_user_with_role(&world.sys().db, &name, Role::Buyer).await;
    world.participants.insert(name, p);
}

#[given(expr = "a bill-to party named {string}")]
async fn bill_to_party(world: &mut MarketplaceWorld, name: String) {
    let btp = create_bill_to_party(&world.sys().db, &name, None).await;
    world.bill_to_parties.insert(name, btp);
}
