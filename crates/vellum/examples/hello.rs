//! Minimal end-to-end render.

use vellum::{Engine, Props, RenderOptions, Value};

fn main() {
    let mut engine = Engine::new();
    engine
        .register_component(
            "app",
            r#"
<!DOCTYPE html>
<html :lang="lang">
<head>
  <meta charset="UTF-8">
  <title>{{title}}</title>
</head>
<body>

<div style="font-size: 20px" :style="{color: color}">
  hello vellum
</div>

</body>
</html>
"#,
        )
        .expect("app template compiles");

    let mut props = Props::new();
    props.append("lang", Value::from("en"));
    props.append("title", Value::from("hello vellum"));
    props.append("color", Value::from("red"));

    let html = engine
        .render_component("app", &RenderOptions::with_props(props))
        .expect("render succeeds");
    println!("{}", html);
    // <!DOCTYPE html><html lang="en"><head><meta charset="UTF-8"><title>hello vellum</title></head><body><div style="color: red; font-size: 20px;">hello vellum</div></body></html>
}
