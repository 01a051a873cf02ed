pub use sea_orm_migration::prelude::*;

mod m20250718_000000_init;
mod m20250720_090000_donation_batches;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250718_000000_init::Migration),
            Box::new(m20250720_090000_donation_batches::Migration),
        ]
    }
}
