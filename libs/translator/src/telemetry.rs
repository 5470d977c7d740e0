use metrics::counter;

use crate::teams::TranslateContext;

const TRANSLATE_SPAN_NAME: &str = "translate.run";
const TRANSLATE_COUNTER: &str = "messages_translated_total";

pub(crate) fn translate_with_span<T, F>(ctx: &TranslateContext<'_>, kind: &'static str, f: F) -> T
where
    F: FnOnce() -> T,
{
    let span = tracing::info_span!(
        TRANSLATE_SPAN_NAME,
        bot_id = %ctx.bot_id,
        thread_id = %ctx.thread_id,
        kind,
        to_platform = "teams"
    );
    let _guard = span.enter();
    let result = f();
    counter!(TRANSLATE_COUNTER, "kind" => kind, "to_platform" => "teams").increment(1);
    result
}
