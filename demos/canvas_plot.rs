// demos/canvas_plot.rs
//! Demo: a plotting pipeline driven through the bridge.
//!
//! Mirrors the classic embedded-runtime setup: asynchronously load a
//! guest runtime plus a "plotting" extension package, expose a canvas
//! and a couple of host drawing callbacks under fixed names, then run
//! guest source that renders through them and read a binding back out.

use async_trait::async_trait;
use runtime_bridge::{
    marshal, BindingTable, BoundaryValue, ExecutionSession, ExecutionUnit, GlobalScope,
    GuestError, GuestRuntime, HostError, LoaderConfig, RuntimeDistribution, RuntimeHandle,
    RuntimeLoader, Side,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Host-side render target the guest draws onto through proxies.
struct Canvas {
    width: u32,
    height: u32,
    ops: Mutex<Vec<String>>,
}

/// A stand-in guest interpreter: executes `name = expr` and `f(args)`
/// statements against the scope, like the scripted runtimes these
/// bridges embed in tests.
struct DemoGuest;

impl DemoGuest {
    fn eval(expr: &str, scope: &GlobalScope) -> Result<BoundaryValue, GuestError> {
        let expr = expr.trim();
        if let (Some(open), true) = (expr.find('('), expr.ends_with(')')) {
            let fname = expr[..open].trim();
            let inner = &expr[open + 1..expr.len() - 1];
            let mut args = Vec::new();
            if !inner.trim().is_empty() {
                for part in inner.split(',') {
                    args.push(Self::eval(part, scope)?);
                }
            }
            let callee = scope
                .get(fname)
                .ok_or_else(|| GuestError::new(format!("name '{}' is not defined", fname)))?;
            let proxy = callee
                .as_callable()
                .ok_or_else(|| GuestError::new(format!("'{}' is not callable", fname)))?;
            return proxy.invoke(&args).map_err(|e| GuestError::new(e.to_string()));
        }
        if expr.starts_with('\'') && expr.ends_with('\'') && expr.len() >= 2 {
            return Ok(BoundaryValue::Str(expr[1..expr.len() - 1].to_string()));
        }
        if let Ok(n) = expr.parse::<i64>() {
            return Ok(BoundaryValue::Int(n));
        }
        if let Ok(x) = expr.parse::<f64>() {
            return Ok(BoundaryValue::Float(x));
        }
        scope
            .get(expr)
            .ok_or_else(|| GuestError::new(format!("name '{}' is not defined", expr)))
    }
}

#[async_trait]
impl GuestRuntime for DemoGuest {
    fn version(&self) -> &str {
        "demo-guest 0.18.1"
    }

    fn execute(&self, source: &str, scope: &GlobalScope) -> Result<BoundaryValue, GuestError> {
        let mut last = BoundaryValue::Null;
        for line in source.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if let Some((name, rhs)) = line.split_once('=') {
                let value = Self::eval(rhs, scope)?;
                scope.set(name.trim(), value.clone());
                last = value;
            } else {
                last = Self::eval(line, scope)?;
            }
        }
        Ok(last)
    }

    async fn load_package(&self, name: &str) -> Result<(), GuestError> {
        println!("  [guest] downloading package '{}'...", name);
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok(())
    }
}

struct CdnDistribution;

#[async_trait]
impl RuntimeDistribution for CdnDistribution {
    async fn fetch(&self, url: &str) -> Result<Box<dyn GuestRuntime>, GuestError> {
        println!("  [cdn] fetching runtime from {}...", url);
        tokio::time::sleep(Duration::from_millis(100)).await;
        Ok(Box::new(DemoGuest))
    }
}

fn bind_host_api(handle: &RuntimeHandle, canvas: Arc<Canvas>) {
    let table = BindingTable::new(handle);

    table
        .bind("canvas", marshal::pass_through(Side::Host, canvas.clone()))
        .expect("bind canvas");

    let target = canvas.clone();
    table
        .bind_fn("draw_line", move |args: &[BoundaryValue]| {
            let coords: Vec<i64> = args
                .iter()
                .map(|a| {
                    a.as_int()
                        .ok_or_else(|| HostError::new("draw_line expects integers"))
                })
                .collect::<Result<_, _>>()?;
            if coords.len() != 4 {
                return Err(HostError::new("draw_line expects x0, y0, x1, y1"));
            }
            target.ops.lock().unwrap().push(format!(
                "line ({},{}) -> ({},{})",
                coords[0], coords[1], coords[2], coords[3]
            ));
            Ok(BoundaryValue::Null)
        })
        .expect("bind draw_line");

    let target = canvas;
    table
        .bind_fn("show", move |_: &[BoundaryValue]| {
            let ops = target.ops.lock().unwrap();
            println!(
                "  [canvas {}x{}] rendering {} ops",
                target.width,
                target.height,
                ops.len()
            );
            for op in ops.iter() {
                println!("    {}", op);
            }
            Ok(BoundaryValue::Str("figure-1".to_string()))
        })
        .expect("bind show");
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt().with_target(false).init();

    println!("=== Runtime Bridge - Canvas Plotting Demo ===\n");

    let loader = RuntimeLoader::new(Arc::new(CdnDistribution));
    let config = LoaderConfig::new("cdn://demo-guest/v0.18.1/full").with_package("plotting");

    let handle = loader.load(config).await.expect("runtime failed to load");
    println!(
        "\nruntime {} ready, packages: {:?}\n",
        handle.version().unwrap_or("?"),
        handle.packages()
    );

    let canvas = Arc::new(Canvas {
        width: 640,
        height: 480,
        ops: Mutex::new(Vec::new()),
    });
    bind_host_api(&handle, canvas);

    let session = ExecutionSession::new(handle.clone());
    let source = r#"
        draw_line(0, 0, 320, 240)
        draw_line(320, 240, 640, 0)
        figure = show()
    "#;
    session
        .run(&ExecutionUnit::new(source))
        .expect("guest source failed");

    let table = BindingTable::new(&handle);
    if let Some(figure) = table.lookup("figure").expect("lookup failed") {
        println!("\nguest produced {}", figure);
    }

    handle.close();
    println!("handle closed; outstanding proxies are now invalid");
}
