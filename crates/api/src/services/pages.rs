//! Server-rendered HTML pages for the marketplace onboarding flow.

use axum::http::StatusCode;
use axum::response::Html;

use domain::models::CustomerDetailsRequest;
use persistence::entities::CurrentEntitlementEntity;

/// Escapes text for use in HTML element content and quoted attributes.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

fn layout(title: &str, body: &str) -> Html<String> {
    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
</head>
<body style="font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, Helvetica, Arial, sans-serif; line-height: 1.6; color: #333; max-width: 640px; margin: 0 auto; padding: 20px;">
{body}
</body>
</html>"#,
        title = escape_html(title),
        body = body
    ))
}

fn entitlement_table(entitlements: &[CurrentEntitlementEntity]) -> String {
    if entitlements.is_empty() {
        return String::new();
    }

    let rows: String = entitlements
        .iter()
        .map(|e| {
            let value = e
                .value
                .to_value()
                .map(|v| v.to_string())
                .unwrap_or_else(|_| "unavailable".to_string());
            format!(
                "        <tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
                escape_html(e.product_name.as_deref().unwrap_or(&e.product_code)),
                escape_html(&e.dimension),
                escape_html(&value),
                e.expiration_date.format("%Y-%m-%d")
            )
        })
        .collect();

    format!(
        r#"    <h3>Your entitlements</h3>
    <table style="width: 100%; border-collapse: collapse;">
        <tr><th align="left">Product</th><th align="left">Dimension</th><th align="left">Value</th><th align="left">Expires</th></tr>
{rows}    </table>
"#
    )
}

/// Page shown for any failed request.
pub fn error_page(status: StatusCode, message: &str) -> Html<String> {
    let title = status.canonical_reason().unwrap_or("Error");
    layout(
        title,
        &format!(
            r#"    <h1>{code} {title}</h1>
    <p>{message}</p>"#,
            code = status.as_u16(),
            title = escape_html(title),
            message = escape_html(message)
        ),
    )
}

/// Page shown once the customer is fully registered.
pub fn success_page(
    product_name: Option<&str>,
    entitlements: &[CurrentEntitlementEntity],
) -> Html<String> {
    let product = product_name
        .map(|p| format!(" for <strong>{}</strong>", escape_html(p)))
        .unwrap_or_default();
    layout(
        "Registration complete",
        &format!(
            r#"    <h1>Registration complete</h1>
    <p>Thank you. Your subscription{product} is active.</p>
{table}"#,
            table = entitlement_table(entitlements)
        ),
    )
}

/// Onboarding form for a customer who still needs to provide details.
///
/// `submitted` pre-fills the fields after a rejected submission.
pub fn onboarding_form(
    action: &str,
    customer_identifier: &str,
    product_name: Option<&str>,
    submitted: Option<&CustomerDetailsRequest>,
    errors: &[String],
    entitlements: &[CurrentEntitlementEntity],
) -> Html<String> {
    let product = product_name
        .map(|p| format!("<p>Product: <strong>{}</strong></p>", escape_html(p)))
        .unwrap_or_default();

    let error_list = if errors.is_empty() {
        String::new()
    } else {
        let items: String = errors
            .iter()
            .map(|e| format!("<li>{}</li>", escape_html(e)))
            .collect();
        format!(r#"    <ul style="color: #b00020;">{items}</ul>"#)
    };

    let field = |name: &str, label: &str, kind: &str, current: Option<&String>| {
        format!(
            r#"        <p><label for="{name}">{label}</label><br>
        <input id="{name}" name="{name}" type="{kind}" value="{current}" required></p>
"#,
            current = current.map(|v| escape_html(v)).unwrap_or_default()
        )
    };

    let fields = [
        field("name", "Full name", "text", submitted.map(|s| &s.name)),
        field("email", "Email", "email", submitted.map(|s| &s.email)),
        field("phone", "Phone", "tel", submitted.map(|s| &s.phone)),
        field("job_role", "Job role", "text", submitted.map(|s| &s.job_role)),
        field("company", "Company", "text", submitted.map(|s| &s.company)),
        field("country", "Country", "text", submitted.map(|s| &s.country)),
    ]
    .concat();

    layout(
        "Complete your registration",
        &format!(
            r#"    <h1>Complete your registration</h1>
    {product}
{error_list}
    <form method="post" action="{action}">
        <input type="hidden" name="customer_identifier" value="{customer_identifier}">
{fields}        <button type="submit">Register</button>
    </form>
{table}"#,
            action = escape_html(action),
            customer_identifier = escape_html(customer_identifier),
            table = entitlement_table(entitlements)
        ),
    )
}
