use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use shipbridge::config::{Cli, Command};
use shipbridge::core::awb::AwbOptions;
use shipbridge::core::returns::ReturnRequest;
use shipbridge::core::OrderRepository;
use shipbridge::domain::model::{Order, ShipmentRequest};
use shipbridge::utils::error::ErrorSeverity;
use shipbridge::utils::{logger, validation::Validate};
use shipbridge::{BridgeConfig, LocalStorage, Services, ShipError};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 初始化日誌
    logger::init_cli_logger(cli.verbose);

    tracing::info!("🚀 Starting shipbridge");
    tracing::info!("📁 Loading configuration from: {}", cli.config);

    let config = match BridgeConfig::from_file(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", cli.config, e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    let services = Services::from_config(config)
        .await
        .context("Failed to initialise services")?;

    if let Err(e) = run(&services, cli.command).await {
        let Some(ship_error) = e.downcast_ref::<ShipError>() else {
            eprintln!("❌ {:#}", e);
            std::process::exit(1);
        };

        // 記錄詳細錯誤信息
        tracing::error!(
            "❌ Command failed: {} (Category: {:?}, Severity: {:?})",
            ship_error,
            ship_error.category(),
            ship_error.severity()
        );
        eprintln!("❌ {}", ship_error.user_friendly_message());
        eprintln!("💡 Suggestion: {}", ship_error.recovery_suggestion());

        // 根據錯誤嚴重程度決定退出碼
        let exit_code = match ship_error.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        };
        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }

    Ok(())
}

async fn run(services: &Services<LocalStorage>, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Quote {
            weight,
            locker,
            oversized,
        } => {
            let shipment = ShipmentRequest::new(weight, locker, oversized);
            let price = services.rates.quote(&shipment).await;
            println!("💰 Shipping for {:.2} kg: {:.2}", shipment.total_weight_kg, price);
        }
        Command::QuoteOrder { order_id, locker } => {
            let order = find_order(services, order_id).await?;
            let shipment = services.rates.shipment_for_lines(&order.lines, locker);
            let price = services.rates.quote(&shipment).await;
            println!(
                "💰 Shipping for order {} ({:.2} kg{}): {:.2}",
                order_id,
                shipment.total_weight_kg,
                if shipment.has_oversized_item { ", oversized" } else { "" },
                price
            );
        }
        Command::Split { order_id } => {
            let order = find_order(services, order_id).await?;
            print_json(&services.rates.analyze_split(&order))?;
        }
        Command::ImportOrders { file } => {
            let content = std::fs::read(&file)
                .with_context(|| format!("Failed to read orders file '{}'", file))?;
            let orders: Vec<Order> = serde_json::from_slice(&content)
                .with_context(|| format!("'{}' is not a JSON array of orders", file))?;
            let count = orders.len();
            for order in orders {
                services.store.put_order(order).await?;
            }
            println!("✅ Imported {} order(s)", count);
        }
        Command::GenerateAwb {
            order_id,
            parcels,
            weight,
        } => {
            let options = AwbOptions {
                parcels,
                weight_kg: weight,
            };
            let awb = services.awb.generate_with(order_id, options).await?;
            println!("✅ AWB {} generated for order {}", awb, order_id);
        }
        Command::ReturnAwb {
            order_id,
            pickup,
            delivery,
            pickup_pudo,
            delivery_pudo,
        } => {
            let request = ReturnRequest {
                order_id,
                pickup_mode: pickup,
                delivery_mode: delivery,
                pickup_pudo_id: pickup_pudo,
                delivery_pudo_id: delivery_pudo,
            };
            let awb = services.returns.generate_return(&request).await?;
            println!("✅ Return AWB {} generated for order {}", awb, order_id);
        }
        Command::Returns { order_id } => {
            print_json(&services.returns.return_awbs(order_id).await?)?;
        }
        Command::Reconcile => {
            print_json(&services.awb.reconcile_statuses().await?)?;
        }
        Command::SyncPudos => {
            print_json(&services.sync.sync().await?)?;
        }
        Command::SearchPudos { city } => {
            print_json(&services.directory.search(&city).await?)?;
        }
        Command::SyncLocalities => {
            let cached = services.localities.sync().await?;
            println!("✅ {} localities cached", cached);
        }
        Command::Locality { city, county } => {
            match services.localities.resolve(&city, county.as_deref()).await? {
                Some(locality) => print_json(&locality)?,
                None => println!("⚠️ No locality named '{}'", city),
            }
        }
        Command::SelectPudo { cart_id, pudo_id } => {
            let pudo = services.directory.select(cart_id, &pudo_id).await?;
            println!("✅ Cart {} → {} ({})", cart_id, pudo.name, pudo.city);
        }
        Command::PrintAwb {
            awb,
            format,
            output,
        } => {
            let pdf = services.account.awb_pdf(&awb, format).await?;
            let path = output.unwrap_or_else(|| format!("awb_{}.pdf", awb.trim()));
            std::fs::write(&path, &pdf).with_context(|| format!("Failed to write '{}'", path))?;
            println!("📄 Label saved to: {}", path);
        }
        Command::Locations => print_json(&services.account.pickup_locations().await?)?,
        Command::PriceTables => print_json(&services.account.price_tables().await?)?,
        Command::Services => print_json(&services.account.services().await?)?,
        Command::Cron { job, token } => {
            print_json(&services.jobs.run(job, &token).await?)?;
        }
    }

    Ok(())
}

async fn find_order(services: &Services<LocalStorage>, order_id: u64) -> anyhow::Result<Order> {
    let order = services
        .store
        .find_order(order_id)
        .await?
        .ok_or(ShipError::OrderNotFound { order_id })?;
    Ok(order)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
