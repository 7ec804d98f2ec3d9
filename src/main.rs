fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("oncopredict-wizard {}", env!("CARGO_PKG_VERSION"));
        return;
    }

    // Probe the analysis service root and exit 0/1.
    if args.iter().any(|a| a == "--check-service") {
        oncopredict_wizard::run_check_service();
        return;
    }

    // Headless demo run: demo patient -> analysis -> Markdown report. Exits 0/1.
    if args.iter().any(|a| a == "--demo-smoke") {
        oncopredict_wizard::run_demo_smoke();
        return;
    }

    // Non-interactive TUI smoke test mode (for automated checks).
    // Renders a single frame for a specific page and exits 0.
    // Usage: --tui-smoke or --tui-smoke=intake|biomarkers|results|export|done|restore|progress|help
    if let Some(arg) = args
        .iter()
        .find(|a| a.as_str() == "--tui-smoke" || a.starts_with("--tui-smoke="))
    {
        let target = arg
            .split_once('=')
            .map(|(_, v)| v.to_string())
            .filter(|v| !v.trim().is_empty());
        oncopredict_wizard::run_tui_smoke(target);
        return;
    }

    oncopredict_wizard::run_tui();
}
