use order_reconcile::{
    config::ReconcileConfig,
    service::OrderService,
    status::{OrderStatus, PurchaseFlag, PurchaseFlags},
    telemetry::init_tracing,
    types::{Account, Material, MaterialId, Money, OrderLine, OrderSnapshot},
};

fn print_stock(service: &OrderService, ids: &[&str]) -> anyhow::Result<()> {
    for id in ids {
        let material = service.material(&MaterialId::from(*id))?;
        println!("  {:<8} {:>4}", material.name, material.inventory);
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    // ORDER_RECONCILE__DB_PATH etc. override this
    let mut config = ReconcileConfig::load(None)?;
    if std::env::var("ORDER_RECONCILE__DB_PATH").is_err() {
        config = ReconcileConfig::temporary_at("walkthrough.db");
    }
    init_tracing(&config.log_filter);

    let service = OrderService::open(&config)?;

    service.register_material(Material::new("wheel", "Wheel", 20))?;
    service.register_material(Material::new("frame", "Frame", 5))?;
    service.register_material(
        Material::new("bike", "Bike", 0)
            .add_component("wheel", 2)
            .add_component("frame", 1),
    )?;
    service.register_account(Account::new("cash", "Cash", Money::from_units(500)))?;

    // assemble three bikes
    let production = OrderSnapshot::new("mo-1", OrderStatus::InProcess)
        .add_line(OrderLine::new("bike", 3));
    service.create_production_order(production.clone())?;
    let report = service.update_production_order(production.set_status(OrderStatus::Finished))?;
    println!("production {}: {:?}", report.order, report.edges);
    print_stock(&service, &["wheel", "frame", "bike"])?;

    // buy frames, receive them, pay the invoice
    let purchase = OrderSnapshot::new("po-1", PurchaseFlags::new().with(PurchaseFlag::Open))
        .add_line(OrderLine::new("frame", 4).with_unit_price(Money::from_units(40)))
        .set_account("cash");
    service.create_purchase_order(purchase.clone())?;
    let received = purchase.set_status(
        PurchaseFlags::new()
            .with(PurchaseFlag::GoodsReceipt)
            .with(PurchaseFlag::InvoiceSettled),
    );
    let report = service.update_purchase_order(received)?;
    println!("purchase {}: {:?}", report.order, report.payment);
    print_stock(&service, &["frame"])?;

    // sell two bikes
    let sale = OrderSnapshot::new("so-1", OrderStatus::Open)
        .add_line(OrderLine::new("bike", 2).with_unit_price(Money::from_units(300)))
        .set_account("cash");
    service.create_sales_order(sale.clone())?;
    let report = service.update_sales_order(sale.set_status(OrderStatus::Finished))?;
    println!("sale {}: {:?}", report.order, report.payment);
    print_stock(&service, &["bike"])?;

    let cash = service.account(&"cash".into())?;
    println!("cash balance: {}", cash.balance);

    service.store().flush()?;
    Ok(())
}
