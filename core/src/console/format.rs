use serde_json::Value;

/// Render one console argument for display. The page-side rendering in
/// `arg_strings` wins when present; otherwise the JSON value is shown with
/// bare strings unquoted and everything else in compact JSON form.
fn render_arg(args: &[Value], arg_strings: &[Option<String>], index: usize) -> String {
    if let Some(Some(rendered)) = arg_strings.get(index) {
        return rendered.clone();
    }
    match args.get(index) {
        Some(Value::String(text)) => text.clone(),
        Some(value) => value.to_string(),
        None => String::new(),
    }
}

/// Format a console event's arguments the way the page's own console would.
///
/// When the first raw argument is a string it is treated as a printf-style
/// template (`%s %d %i %f %j %o %O %c %%`, the `util.format` subset);
/// arguments not consumed by the template are appended space-separated and
/// specifiers without a matching argument are left verbatim. When the first
/// argument is not a string, all rendered arguments are joined with single
/// spaces.
pub fn format_console_args(args: &[Value], arg_strings: &[Option<String>]) -> String {
    match args.first() {
        Some(Value::String(_)) => {
            let template = render_arg(args, arg_strings, 0);
            interpolate(&template, args, arg_strings)
        }
        _ => (0..args.len())
            .map(|i| render_arg(args, arg_strings, i))
            .collect::<Vec<_>>()
            .join(" "),
    }
}

fn interpolate(template: &str, args: &[Value], arg_strings: &[Option<String>]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut next_arg = 1;
    let mut chars = template.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '%' {
            out.push(ch);
            continue;
        }
        match chars.peek() {
            Some('%') => {
                chars.next();
                out.push('%');
            }
            Some(&specifier) => {
                let replacement = if next_arg < args.len() {
                    substitute(specifier, args, arg_strings, next_arg)
                } else {
                    // unknown specifier, or no argument left for it: keep
                    // the literal text
                    None
                };
                match replacement {
                    Some(text) => {
                        chars.next();
                        next_arg += 1;
                        out.push_str(&text);
                    }
                    None => out.push('%'),
                }
            }
            None => out.push('%'),
        }
    }

    for index in next_arg..args.len() {
        out.push(' ');
        out.push_str(&render_arg(args, arg_strings, index));
    }
    out
}

fn substitute(
    specifier: char,
    args: &[Value],
    arg_strings: &[Option<String>],
    index: usize,
) -> Option<String> {
    match specifier {
        's' | 'o' | 'O' => Some(render_arg(args, arg_strings, index)),
        'd' | 'f' => Some(render_number(&args[index], false)),
        'i' => Some(render_number(&args[index], true)),
        'j' => Some(args[index].to_string()),
        // %c carries CSS styling in a real console; it consumes its
        // argument and renders nothing in a text log
        'c' => Some(String::new()),
        _ => None,
    }
}

fn render_number(value: &Value, truncate: bool) -> String {
    // The i64 casts below saturate at 2^63; larger magnitudes keep the
    // float's own rendering.
    const INT_LIMIT: f64 = 9_223_372_036_854_775_808.0;
    match value.as_f64() {
        Some(number) if number.abs() >= INT_LIMIT => format!("{number}"),
        Some(number) if truncate => format!("{}", number.trunc() as i64),
        Some(number) => {
            if number.fract() == 0.0 {
                format!("{}", number as i64)
            } else {
                format!("{number}")
            }
        }
        None => "NaN".to_string(),
    }
}

/// Center `label` in a line of `width` columns padded with `fill`. Labels
/// wider than the line are returned unchanged.
pub(crate) fn pad_center(label: &str, width: usize, fill: char) -> String {
    let label_width = label.chars().count();
    if label_width >= width {
        return label.to_string();
    }
    let total = width - label_width;
    let left = total / 2;
    let right = total - left;
    let mut out = String::with_capacity(width);
    out.extend(std::iter::repeat_n(fill, left));
    out.push_str(label);
    out.extend(std::iter::repeat_n(fill, right));
    out
}
