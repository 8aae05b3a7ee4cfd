use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use inquire::{Confirm, CustomType, DateSelect, Password, Select, Text};

use invoice_desk::api::{HttpApi, InvoiceApi};
use invoice_desk::config::{
    clear_session, get_config_path, get_session_path, load_company_profile, load_session,
    load_settings, save_session, save_settings, CompanyProfile, Settings,
};
use invoice_desk::document::{
    expected_totals, invoice_total_lines, parse_totals, Document, DocumentOptions, Renderer,
};
use invoice_desk::filter::RecordFilter;
use invoice_desk::model::{ClientSuggestion, Invoice, Record, User};
use invoice_desk::money::{format_money, parse_number, DiscountPolicy};
use invoice_desk::mutation::{
    confirm_delete, ClientFields, ConversionForm, EditForm, InvoiceForm, LineRow, PaymentForm,
    QuoteForm,
};
use invoice_desk::period::Period;
use invoice_desk::projection::Window;
use invoice_desk::report;
use invoice_desk::stats::PeriodStats;
use invoice_desk::workflow::Desk;
use invoice_desk::{logging, DeskError};

// ==========================================
// Constants
// ==========================================
const NEW_CLIENT_OPT: &str = "➕ New Client";
const CATEGORIES: [&str; 3] = ["Residential", "Commercial", "Industrial"];
const PAYMENT_OPTIONS: [&str; 3] = ["Bank Transfer", "Check", "Cash"];

// ==========================================
// Command Line
// ==========================================

#[derive(Parser)]
#[command(name = "invoice-desk", version, about = "Admin console for invoices and quotations")]
struct Cli {
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args, Debug, Clone, Default)]
struct PeriodArgs {
    /// all, fy2024, fy2025 or custom (defaults to the current financial year)
    #[arg(long)]
    period: Option<Period>,
    /// First day of a custom range (YYYY-MM-DD)
    #[arg(long)]
    from: Option<NaiveDate>,
    /// Last day of a custom range (YYYY-MM-DD)
    #[arg(long)]
    to: Option<NaiveDate>,
}

impl PeriodArgs {
    fn resolve(&self, today: NaiveDate) -> Period {
        if self.from.is_some() || self.to.is_some() {
            return Period::Custom { start: self.from, end: self.to };
        }
        self.period.unwrap_or_else(|| Period::default_for(today))
    }
}

#[derive(Args, Debug, Clone, Default)]
struct FilterArgs {
    /// Client name contains (case-insensitive)
    #[arg(short, long)]
    search: Option<String>,
    /// Created on this day (YYYY-MM-DD)
    #[arg(long)]
    date: Option<NaiveDate>,
    /// Residential, Commercial, Industrial or "All Categories"
    #[arg(long)]
    category: Option<String>,
    /// Invoice or quote number contains
    #[arg(short, long)]
    number: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
struct WindowArgs {
    /// Show this many extra pages of older records
    #[arg(long, default_value_t = 0)]
    more: usize,
    /// Show every matching record
    #[arg(long)]
    all: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in as an admin
    Login {
        #[arg(short, long)]
        username: Option<String>,
    },
    /// Sign out and forget the saved session
    Logout,
    /// Show the signed-in account
    Whoami,
    /// List invoices
    Invoices {
        #[command(flatten)]
        period: PeriodArgs,
        #[command(flatten)]
        filter: FilterArgs,
        /// Only invoices with an amount still due
        #[arg(long)]
        unpaid: bool,
        #[command(flatten)]
        window: WindowArgs,
    },
    /// Totals for a period
    Stats {
        #[command(flatten)]
        period: PeriodArgs,
    },
    /// Unpaid invoices in a period
    Unpaid {
        #[command(flatten)]
        period: PeriodArgs,
    },
    /// Write a printable invoice
    Show {
        invoice_number: String,
        /// Open the file once written
        #[arg(long)]
        open: bool,
    },
    /// Record a payment against an invoice
    Pay { invoice_number: String },
    /// Edit an invoice
    Edit { invoice_number: String },
    /// Delete an invoice
    Delete { invoice_number: String },
    /// Create a new invoice
    NewInvoice,
    /// List quotations
    Quotes {
        #[command(flatten)]
        period: PeriodArgs,
        #[command(flatten)]
        filter: FilterArgs,
        #[command(flatten)]
        window: WindowArgs,
    },
    /// Write a printable quotation
    ShowQuote {
        quote_number: String,
        #[arg(long)]
        open: bool,
    },
    /// Create a new quotation
    NewQuote,
    /// Delete a quotation
    DeleteQuote { quote_number: String },
    /// Turn a quotation into an invoice
    ConvertQuote { quote_number: String },
    /// Configure backend, output folder and display options
    Config,
}

// ==========================================
// Main Function
// ==========================================

fn main() {
    let cli = Cli::parse();

    if let Err(e) = logging::initialize(cli.verbose) {
        eprintln!("⚠️  Logging unavailable: {}", e);
    }

    if let Err(e) = run(cli) {
        match e.downcast_ref::<DeskError>() {
            Some(DeskError::Cancelled) => eprintln!("Cancelled."),
            Some(DeskError::Unauthorized) => {
                eprintln!("❌ Not signed in as an admin. Run `invoice-desk login` first.")
            }
            _ => eprintln!("❌ Error: {:#}", e),
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let Some(command) = cli.command else {
        use clap::CommandFactory;
        Cli::command().print_help()?;
        return Ok(());
    };

    let settings_path = get_config_path();
    if let Commands::Config = command {
        setup_config_wizard(&settings_path)?;
        return Ok(());
    }

    let settings = load_settings(&settings_path)?;
    let session_path = get_session_path();
    let mut api = HttpApi::new(&settings.api_base_url)?;
    if let Some(cookie) = load_session(&session_path) {
        api = api.with_session(&cookie);
    }
    let today = Local::now().date_naive();

    let command = match command {
        Commands::Login { username } => return login(&api, &session_path, username),
        Commands::Logout => {
            // the local session goes even if the backend call fails
            let result = api.logout();
            clear_session(&session_path)?;
            result?;
            println!("👋 Signed out.");
            return Ok(());
        }
        Commands::Whoami => {
            match api.me()? {
                Some(user) => println!("{} ({})", user.username, user.role),
                None => println!("Not signed in."),
            }
            return Ok(());
        }
        other => other,
    };

    require_admin(&api)?;
    let mut desk = Desk::new(api);

    match command {
        Commands::Invoices { period, filter, unpaid, window } => {
            list_invoices(&mut desk, &settings, period.resolve(today), filter, unpaid, window)?;
        }
        Commands::Stats { period } => {
            desk.refresh_invoices()?;
            let stats = PeriodStats::collect(period.resolve(today), desk.invoices().list());
            println!("{}", report::stats_table(&stats, &settings.currency_symbol));
        }
        Commands::Unpaid { period } => {
            desk.refresh_invoices()?;
            let stats = PeriodStats::collect(period.resolve(today), desk.invoices().list());
            if stats.unpaid.is_empty() {
                println!("🎉 No unpaid invoices for {}.", stats.period.label());
            } else {
                println!("\n--- Unpaid Invoices ({}) ---", stats.period.label());
                println!("{}", report::invoice_table(&stats.unpaid, &settings.currency_symbol));
            }
        }
        Commands::Show { invoice_number, open } => {
            let company = load_company_profile(&settings.output_root())?;
            let document = desk.print_invoice(&invoice_number, options(&settings, &company))?;
            let path = write_document(&settings.output_root().join("invoices"), &document)?;
            finish_document(&path, open);
        }
        Commands::Pay { invoice_number } => pay(&mut desk, &settings, &invoice_number)?,
        Commands::Edit { invoice_number } => edit(&mut desk, &invoice_number)?,
        Commands::Delete { invoice_number } => {
            let answer = Confirm::new(&format!(
                "Delete invoice {}? This cannot be undone.",
                invoice_number
            ))
            .with_default(false)
            .prompt()?;
            desk.delete_invoice(confirm_delete(&invoice_number, answer)?)?;
            println!("🗑️  Invoice {} deleted.", invoice_number);
        }
        Commands::NewInvoice => {
            let form = invoice_wizard(&desk, today)?;
            println!("✅ {}", desk.create_invoice(&form)?);
        }
        Commands::Quotes { period, filter, window } => {
            list_quotes(&mut desk, &settings, period.resolve(today), filter, window)?;
        }
        Commands::ShowQuote { quote_number, open } => {
            desk.refresh_quotes()?;
            let company = load_company_profile(&settings.output_root())?;
            let document = desk.print_quote(&quote_number, options(&settings, &company))?;
            let path = write_document(&settings.output_root().join("quotes"), &document)?;
            finish_document(&path, open);
        }
        Commands::NewQuote => {
            let form = quote_wizard(&desk, today)?;
            println!("✅ {}", desk.create_quote(&form)?);
        }
        Commands::DeleteQuote { quote_number } => {
            let answer = Confirm::new(&format!(
                "Delete quote {}? This cannot be undone.",
                quote_number
            ))
            .with_default(false)
            .prompt()?;
            desk.delete_quote(confirm_delete(&quote_number, answer)?)?;
            println!("🗑️  Quote {} deleted.", quote_number);
        }
        Commands::ConvertQuote { quote_number } => {
            desk.refresh_quotes()?;
            let quote = desk.quote(&quote_number)?;
            println!("Converting quote {} for {}", quote.quote_number, quote.client_name);
            let form = ConversionForm {
                payment_option: Select::new("Payment Option:", PAYMENT_OPTIONS.to_vec())
                    .prompt()?
                    .to_string(),
                paid_amount: Text::new("Paid Amount:").with_default("0").prompt()?,
            };
            println!("✅ {}", desk.convert_quote(&quote_number, &form, today)?);
        }
        Commands::Login { .. } | Commands::Logout | Commands::Whoami | Commands::Config => {}
    }
    Ok(())
}

// ==========================================
// 1. Session
// ==========================================

fn login(api: &HttpApi, session_path: &Path, username: Option<String>) -> Result<()> {
    let username = match username {
        Some(u) => u,
        None => Text::new("Username:").prompt()?,
    };
    let password = Password::new("Password:").without_confirmation().prompt()?;
    let user = api.login(username.trim(), &password)?;
    if !user.is_admin() {
        api.logout().ok();
        bail!("Access denied. {} is not an admin.", user.username);
    }
    match api.session_cookie() {
        Some(cookie) => save_session(session_path, &cookie)?,
        None => tracing::warn!("login succeeded but no session cookie was set"),
    }
    println!("✅ Signed in as {}.", user.username);
    Ok(())
}

fn require_admin(api: &impl InvoiceApi) -> Result<User> {
    match api.me()? {
        Some(user) if user.is_admin() => Ok(user),
        Some(user) => bail!("Access denied. {} is not an admin.", user.username),
        None => Err(DeskError::Unauthorized.into()),
    }
}

// ==========================================
// 2. Lists
// ==========================================

fn record_filter(args: FilterArgs, unpaid_only: bool) -> RecordFilter {
    RecordFilter {
        name: args.search,
        number: args.number,
        date: args.date,
        category: args.category,
        unpaid_only,
    }
}

fn visible<'a, R>(filtered: &[&'a R], searching: bool, settings: &Settings, args: &WindowArgs) -> Vec<&'a R> {
    let mut window = Window::new(settings.window_size);
    if args.all {
        window = Window::new(filtered.len());
    }
    for _ in 0..args.more {
        window.show_more(filtered.len());
    }
    window.project(filtered, searching)
}

fn footer_line(kind: &str, shown: usize, matched: usize, period: &Period, searching: bool) {
    println!("Showing {} of {} {} ({})", shown, matched, kind, period.label());
    if !searching && shown < matched {
        println!("💡 Use --more or --all to see older {}.", kind);
    }
}

fn list_invoices(
    desk: &mut Desk<HttpApi>,
    settings: &Settings,
    period: Period,
    args: FilterArgs,
    unpaid: bool,
    window: WindowArgs,
) -> Result<()> {
    desk.refresh_invoices()?;
    let filter = record_filter(args, unpaid);
    let in_period = period.apply(desk.invoices().list());
    let filtered = filter.apply(in_period);
    let searching = filter.is_searching();
    let shown = visible(&filtered, searching, settings, &window);
    if shown.is_empty() {
        println!("No invoices found.");
        return Ok(());
    }
    println!("{}", report::invoice_table(&shown, &settings.currency_symbol));
    footer_line("invoices", shown.len(), filtered.len(), &period, searching);
    Ok(())
}

fn list_quotes(
    desk: &mut Desk<HttpApi>,
    settings: &Settings,
    period: Period,
    args: FilterArgs,
    window: WindowArgs,
) -> Result<()> {
    desk.refresh_quotes()?;
    let filter = record_filter(args, false);
    let in_period = period.apply(desk.quotes().list());
    let filtered = filter.apply(in_period);
    let searching = filter.is_searching();
    let shown = visible(&filtered, searching, settings, &window);
    if shown.is_empty() {
        println!("No quotes found.");
        return Ok(());
    }
    println!(
        "{}",
        report::quote_table(&shown, &settings.currency_symbol, settings.discount_policy)
    );
    footer_line("quotes", shown.len(), filtered.len(), &period, searching);
    Ok(())
}

// ==========================================
// 3. Printable Documents
// ==========================================

fn options<'a>(settings: &'a Settings, company: &'a CompanyProfile) -> DocumentOptions<'a> {
    DocumentOptions {
        company,
        policy: settings.discount_policy,
        currency: &settings.currency_symbol,
    }
}

fn write_document(dir: &Path, document: &Document) -> Result<PathBuf> {
    let html = Renderer::new()?.render(document)?;
    let expected = expected_totals(&document.totals);
    if parse_totals(&html) != expected {
        tracing::warn!(number = %document.number, "rendered totals differ from the document model");
    }
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let path = dir.join(document.file_name());
    fs::write(&path, html).with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

fn finish_document(path: &Path, open: bool) {
    println!("✅ Saved: {}", path.display());
    if open {
        open_and_reveal(path);
    }
}

// Open file and reveal it in Finder/Explorer
fn open_and_reveal(path: &Path) {
    #[cfg(target_os = "macos")]
    Command::new("open").arg("-R").arg(path).spawn().ok();

    #[cfg(target_os = "windows")]
    Command::new("explorer").arg(format!("/select,{}", path.to_string_lossy())).spawn().ok();

    #[cfg(target_os = "macos")]
    Command::new("open").arg(path).spawn().ok();

    #[cfg(target_os = "windows")]
    Command::new("explorer").arg(path).spawn().ok();

    #[cfg(target_os = "linux")]
    Command::new("xdg-open").arg(path).spawn().ok();
}

// ==========================================
// 4. Payment & Edit
// ==========================================

fn pay(desk: &mut Desk<HttpApi>, settings: &Settings, invoice_number: &str) -> Result<()> {
    let invoice = desk.invoice(invoice_number)?;
    print_invoice_totals(&invoice, settings);
    if invoice.is_settled() {
        println!("ℹ️  Invoice {} is already paid in full.", invoice_number);
    }

    let mut form = PaymentForm {
        paid_amount: Text::new("Paid Amount:").prompt()?,
        ..PaymentForm::default()
    };
    let clears = parse_number(&form.paid_amount).is_some_and(|p| p >= invoice.remaining_amount);
    if clears {
        form.reference_number = Text::new("Reference Number:").prompt()?;
        form.paid_date = Some(
            DateSelect::new("Paid Date:")
                .with_default(Local::now().date_naive())
                .prompt()?,
        );
    }

    let updated = desk.update_payment(invoice_number, &form)?;
    println!(
        "✅ Payment updated. Due now {}.",
        format_money(&settings.currency_symbol, updated.remaining_amount)
    );
    Ok(())
}

fn print_invoice_totals(invoice: &Invoice, settings: &Settings) {
    let lines = invoice_total_lines(invoice, settings.discount_policy, &settings.currency_symbol);
    println!("\n--- Invoice {} ({}) ---", invoice.business_key(), invoice.client_name);
    println!("{}", report::totals_table(&lines));
}

fn edit(desk: &mut Desk<HttpApi>, invoice_number: &str) -> Result<()> {
    let mut form = desk.open_edit(invoice_number)?;
    println!("\n--- Editing Invoice {} ---", form.invoice_number);

    form.client_name = Text::new("Client Name:").with_initial_value(&form.client_name).prompt()?;
    form.client_phone = Text::new("Client Phone:").with_initial_value(&form.client_phone).prompt()?;
    form.client_address = Text::new("Client Address:").with_initial_value(&form.client_address).prompt()?;
    form.post_code = Text::new("Post Code:").with_initial_value(&form.post_code).prompt()?;
    form.site_address = Text::new("Site Address:").with_initial_value(&form.site_address).prompt()?;
    form.site_post_code = Text::new("Site Post Code:").with_initial_value(&form.site_post_code).prompt()?;
    form.payment_option = pick("Payment Option:", &PAYMENT_OPTIONS, &form.payment_option)?;
    form.category = pick("Category:", &CATEGORIES, &form.category)?;

    edit_services(&mut form)?;

    form.paid_amount = Text::new("Paid Amount:").with_initial_value(&form.paid_amount).prompt()?;

    let updated = desk.save_edit(&form)?;
    println!("✅ Invoice {} updated.", updated.invoice_number);
    Ok(())
}

/// Select with the current value preselected; unknown values are kept as an option.
fn pick(message: &str, choices: &[&str], current: &str) -> Result<String> {
    let mut options: Vec<String> = choices.iter().map(|c| c.to_string()).collect();
    if !current.is_empty() && !options.iter().any(|o| o == current) {
        options.insert(0, current.to_string());
    }
    let cursor = options.iter().position(|o| o == current).unwrap_or(0);
    Ok(Select::new(message, options).with_starting_cursor(cursor).prompt()?)
}

fn edit_services(form: &mut EditForm) -> Result<()> {
    const ADD: &str = "➕ Add service";
    const REMOVE: &str = "🗑️  Remove service";
    const DONE: &str = "✔ Done";

    loop {
        let mut options: Vec<String> = form
            .services
            .iter()
            .enumerate()
            .map(|(i, row)| format!("{}. {} ({} x {})", i + 1, row.name, row.price, row.quantity))
            .collect();
        options.extend([ADD, REMOVE, DONE].map(String::from));

        let choice = Select::new("Services:", options.clone()).prompt()?;
        match choice.as_str() {
            ADD => {
                form.add_service();
                let last = form.services.len() - 1;
                prompt_row(&mut form.services[last])?;
            }
            REMOVE => {
                if form.services.is_empty() {
                    continue;
                }
                let labels = options[..form.services.len()].to_vec();
                let target = Select::new("Remove which service?", labels).raw_prompt()?;
                form.remove_service(target.index);
            }
            DONE => return Ok(()),
            _ => {
                if let Some(index) = options.iter().position(|o| *o == choice) {
                    prompt_row(&mut form.services[index])?;
                }
            }
        }
    }
}

fn prompt_row(row: &mut LineRow) -> Result<()> {
    row.name = Text::new("Service name:").with_initial_value(&row.name).prompt()?;
    row.price = Text::new("Price:").with_initial_value(&row.price).prompt()?;
    row.quantity = Text::new("Quantity:").with_initial_value(&row.quantity).prompt()?;
    Ok(())
}

// ==========================================
// 5. Creation Wizards
// ==========================================

fn select_client(desk: &Desk<HttpApi>) -> Result<ClientFields> {
    let query = Text::new("Search existing clients (Enter to skip):").prompt()?;
    let suggestions = desk.search_clients(&query)?;

    let mut chosen: Option<ClientSuggestion> = None;
    if !suggestions.is_empty() {
        let mut options = vec![NEW_CLIENT_OPT.to_string()];
        options.extend(suggestions.iter().map(|s| format!("{} ({})", s.client_name, s.post_code)));
        let choice = Select::new("Please Select Client (Type to Filter):", options).raw_prompt()?;
        if choice.index > 0 {
            chosen = suggestions.into_iter().nth(choice.index - 1);
        }
    }
    let base = chosen.unwrap_or(ClientSuggestion {
        client_name: query.trim().to_string(),
        client_phone: String::new(),
        client_address: String::new(),
        post_code: String::new(),
    });

    Ok(ClientFields {
        client_name: Text::new("Client Name:").with_initial_value(&base.client_name).prompt()?,
        client_phone: Text::new("Client Phone:").with_initial_value(&base.client_phone).prompt()?,
        client_address: Text::new("Client Address:").with_initial_value(&base.client_address).prompt()?,
        post_code: Text::new("Post Code:").with_initial_value(&base.post_code).prompt()?,
        category: Select::new("Category:", CATEGORIES.to_vec()).prompt()?.to_string(),
    })
}

fn enter_rows(kind: &str) -> Result<Vec<LineRow>> {
    let mut rows = Vec::new();
    println!("\n--- Enter {}s ---", kind);
    println!("(Leave the name empty to finish)");
    loop {
        let name = Text::new(&format!("{} name:", kind)).prompt()?;
        if name.trim().is_empty() {
            break;
        }
        let price = Text::new("Price:").prompt()?;
        let quantity = Text::new("Quantity:").with_default("1").prompt()?;
        rows.push(LineRow::new(name, price, quantity));
    }
    Ok(rows)
}

fn invoice_wizard(desk: &Desk<HttpApi>, today: NaiveDate) -> Result<InvoiceForm> {
    println!("\n--- New Invoice ---");
    let mut form = InvoiceForm::new(today);
    form.client = select_client(desk)?;
    form.site_address = Text::new("Site Address (Optional):").prompt()?;
    form.site_post_code = Text::new("Site Post Code (Optional):").prompt()?;
    form.payment_option = Select::new("Payment Option:", PAYMENT_OPTIONS.to_vec()).prompt()?.to_string();
    form.services = enter_rows("Service")?;
    form.paid_amount = Text::new("Paid Amount:").with_default("0").prompt()?;
    form.date = DateSelect::new("Invoice Date:").with_default(today).prompt()?;
    Ok(form)
}

fn quote_wizard(desk: &Desk<HttpApi>, today: NaiveDate) -> Result<QuoteForm> {
    println!("\n--- New Quotation ---");
    let mut form = QuoteForm::new(today);
    form.client = select_client(desk)?;
    form.services = enter_rows("Service")?;
    form.materials = enter_rows("Material")?;
    form.discount = Text::new("Discount:").with_default("0").prompt()?;
    form.date = DateSelect::new("Quote Date:").with_default(today).prompt()?;
    form.valid_until = Some(
        DateSelect::new("Valid Until:")
            .with_default(today + chrono::Duration::days(30))
            .with_min_date(today)
            .prompt()?,
    );
    form.notes = Text::new("Notes (Optional):").prompt()?;
    Ok(form)
}

// ==========================================
// 6. Config
// ==========================================

fn setup_config_wizard(path: &Path) -> Result<Settings> {
    println!("\n⚙️  --- Configuration Setup ---");
    let current = load_settings(path).unwrap_or_default();

    let policies = vec![DiscountPolicy::Flat, DiscountPolicy::Percentage];
    let policy_cursor = policies.iter().position(|p| *p == current.discount_policy).unwrap_or(0);

    let settings = Settings {
        api_base_url: Text::new("Backend URL:").with_default(&current.api_base_url).prompt()?,
        output_dir: Text::new("Output Directory:").with_default(&current.output_dir).prompt()?,
        window_size: CustomType::<usize>::new("Records shown by default:")
            .with_default(current.window_size)
            .prompt()?,
        discount_policy: Select::new("Discount is read as:", policies)
            .with_starting_cursor(policy_cursor)
            .prompt()?,
        currency_symbol: Text::new("Currency Symbol:").with_default(&current.currency_symbol).prompt()?,
    };

    save_settings(path, &settings)?;
    println!("✅ Settings saved to {}.", path.display());
    if settings.output_dir != current.output_dir || !settings.output_root().join("company.toml").exists() {
        load_company_profile(&settings.output_root())?;
        println!("📄 Company details: {}", settings.output_root().join("company.toml").display());
    }
    Ok(settings)
}
