//! Script runtime management
//!
//! Provides a JavaScript runtime that can host scriptq message queues.
//! Queue operations are plain functions stored once per context under
//! `__scriptq_ops`; each published queue is an object carrying its handle and
//! those functions as methods, so `lqueue.push(msg)` resolves the queue from
//! `this`.

use crate::convert::{self, IntoScript};
use crate::error::ScriptError;
use crate::ffi::{HandleTable, ScriptHandle, LENT_HANDLE_KEY, OPS_GLOBAL, QUEUE_HANDLE_KEY};
use crate::settings::ScriptSettings;
use rquickjs::function::{Opt, This};
use rquickjs::{
    CatchResultExt, CaughtError, Context, Ctx, Exception, FromJs, Function, IntoJs, Object,
    Runtime, Value as JsValue,
};
use scriptq_core::{GuestRuntime, MessageQueue, NoExtension, QueueOp, RuntimeId, UnsafeRef};
use std::path::Path;
use std::sync::{Arc, RwLock};
use tracing::debug;

type QueueTable<E> = HandleTable<Arc<MessageQueue<E>>>;
type LentTable<E> = HandleTable<UnsafeRef<E>>;

/// Script execution context
pub struct ScriptRuntime<E = NoExtension> {
    #[allow(dead_code)] // Kept alive for context lifetime
    runtime: Runtime,
    pub context: Context,
    id: RuntimeId,
    settings: ScriptSettings,
    queues: Arc<QueueTable<E>>,
    lent: Arc<LentTable<E>>,
}

impl<E: IntoScript> ScriptRuntime<E> {
    pub fn new() -> Result<Self, ScriptError> {
        Self::with_settings(ScriptSettings::default())
    }

    pub fn with_settings(settings: ScriptSettings) -> Result<Self, ScriptError> {
        let runtime = Runtime::new()?;
        let context = Context::full(&runtime)?;
        let id = RuntimeId::next();
        debug!(runtime = %id, max_depth = settings.max_depth, "created script runtime");

        Ok(Self {
            runtime,
            context,
            id,
            settings,
            queues: Arc::new(HandleTable::new()),
            lent: Arc::new(HandleTable::new()),
        })
    }

    pub fn id(&self) -> RuntimeId {
        self.id
    }

    pub fn settings(&self) -> &ScriptSettings {
        &self.settings
    }

    pub fn execute_file(&self, path: &Path) -> Result<(), ScriptError> {
        let source = std::fs::read_to_string(path).map_err(|source| ScriptError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.execute(&source)
    }

    pub fn execute(&self, source: &str) -> Result<(), ScriptError> {
        self.context
            .with(|ctx| ctx.eval::<(), _>(source).catch(&ctx).map_err(caught))
    }

    /// Evaluate an expression and convert its result.
    pub fn eval<T>(&self, source: &str) -> Result<T, ScriptError>
    where
        T: for<'js> FromJs<'js>,
    {
        self.context
            .with(|ctx| ctx.eval::<T, _>(source).catch(&ctx).map_err(caught))
    }

    /// Call a JavaScript function by name with no arguments.
    pub fn call_function(&self, name: &str) -> Result<(), ScriptError> {
        self.context.with(|ctx| {
            let func: Function = ctx.globals().get(name)?;
            func.call::<_, ()>(()).catch(&ctx).map_err(caught)
        })
    }

    pub fn read_global<T>(&self, name: &str) -> Result<T, ScriptError>
    where
        T: for<'js> FromJs<'js>,
    {
        self.context
            .with(|ctx| ctx.globals().get::<_, T>(name).map_err(ScriptError::from))
    }

    pub fn set_global<T>(&self, name: &str, value: T) -> Result<(), ScriptError>
    where
        T: for<'js> IntoJs<'js>,
    {
        self.context
            .with(|ctx| ctx.globals().set(name, value).map_err(ScriptError::from))
    }

    /// Lend `storage` to scripts as the global `name`.
    ///
    /// The script sees an opaque object. Pushing it (alone or inside a table)
    /// copies whatever `storage` holds at that moment into the queue. The
    /// runtime keeps only a weak reference to `storage`.
    pub fn lend<T>(&self, name: &str, storage: &Arc<RwLock<T>>) -> Result<ScriptHandle, ScriptError>
    where
        T: Clone + Into<E> + Send + Sync + 'static,
    {
        let lent = UnsafeRef::lend(storage);
        let type_name = lent.type_name();
        let handle = self.lent.insert(lent);

        let published = self.context.with(|ctx| -> Result<(), ScriptError> {
            let object = Object::new(ctx.clone())?;
            object.set(LENT_HANDLE_KEY, handle.0)?;
            ctx.globals().set(name, object)?;
            Ok(())
        });
        if let Err(err) = published {
            self.lent.remove(handle);
            return Err(err);
        }

        debug!(runtime = %self.id, %handle, name, type_name, "lent storage to script");
        Ok(handle)
    }

    /// Forget a lent reference. Later pushes of its script object fail.
    pub fn release(&self, handle: ScriptHandle) -> bool {
        self.lent.remove(handle).is_some()
    }

    /// Queue a script object refers to, by handle.
    pub fn queue(&self, handle: ScriptHandle) -> Option<Arc<MessageQueue<E>>> {
        self.queues.get(handle)
    }

    /// Handle of the queue published under the global `name`, if any.
    pub fn queue_handle(&self, name: &str) -> Result<Option<ScriptHandle>, ScriptError> {
        self.context.with(|ctx| {
            let object: Option<Object> = ctx.globals().get(name)?;
            let raw = match object {
                Some(object) => object.get::<_, Option<u32>>(QUEUE_HANDLE_KEY)?,
                None => None,
            };
            Ok(raw.map(ScriptHandle))
        })
    }
}

impl<E: IntoScript> GuestRuntime<E> for ScriptRuntime<E> {
    type Error = ScriptError;

    fn runtime_id(&self) -> RuntimeId {
        self.id
    }

    fn register_queue_ops(&self, ops: &[QueueOp]) -> Result<(), ScriptError> {
        self.context.with(|ctx| -> Result<(), ScriptError> {
            let table = Object::new(ctx.clone())?;
            for &op in ops {
                let function = queue_op(&ctx, op, &self.queues, &self.lent, &self.settings)?;
                table.set(op.name(), function)?;
            }
            ctx.globals().set(OPS_GLOBAL, table)?;
            Ok(())
        })
    }

    fn publish_queue(&self, name: &str, queue: Arc<MessageQueue<E>>) -> Result<(), ScriptError> {
        if let Some(current) = self.published_queue(name)? {
            if !Arc::ptr_eq(&current, &queue) {
                return Err(ScriptError::NameTaken {
                    name: name.to_string(),
                });
            }
        }

        let handle = self.queues.insert(queue);
        self.context.with(|ctx| -> Result<(), ScriptError> {
            let ops: Object = ctx.globals().get(OPS_GLOBAL)?;
            let object = Object::new(ctx.clone())?;
            object.set(QUEUE_HANDLE_KEY, handle.0)?;
            for op in QueueOp::ALL {
                let function: Option<Function> = ops.get(op.name())?;
                if let Some(function) = function {
                    object.set(op.name(), function)?;
                }
            }
            ctx.globals().set(name, object)?;
            Ok(())
        })?;
        debug!(runtime = %self.id, %handle, name, "published queue");
        Ok(())
    }

    fn published_queue(&self, name: &str) -> Result<Option<Arc<MessageQueue<E>>>, ScriptError> {
        Ok(self.queue_handle(name)?.and_then(|handle| self.queue(handle)))
    }
}

fn caught(err: CaughtError<'_>) -> ScriptError {
    match err {
        CaughtError::Error(err) => ScriptError::Engine(err),
        other => ScriptError::Exception(other.to_string()),
    }
}

/// Resolve the queue behind the `this` object of a queue method call.
fn this_queue<'js, E>(
    ctx: &Ctx<'js>,
    queues: &QueueTable<E>,
    this: &Object<'js>,
) -> rquickjs::Result<Arc<MessageQueue<E>>> {
    let raw: Option<u32> = this.get(QUEUE_HANDLE_KEY)?;
    raw.and_then(|raw| queues.get(ScriptHandle(raw)))
        .ok_or_else(|| Exception::throw_type(ctx, "queue method called on an object that is not a message queue"))
}

fn queue_op<'js, E: IntoScript>(
    ctx: &Ctx<'js>,
    op: QueueOp,
    queues: &Arc<QueueTable<E>>,
    lent: &Arc<LentTable<E>>,
    settings: &ScriptSettings,
) -> rquickjs::Result<Function<'js>> {
    let queues = Arc::clone(queues);
    match op {
        QueueOp::Size => Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>, this: This<Object<'js>>| -> rquickjs::Result<usize> {
                Ok(this_queue(&ctx, &queues, &this.0)?.size())
            },
        ),
        QueueOp::Push => {
            let lent = Arc::clone(lent);
            let settings = settings.clone();
            Function::new(
                ctx.clone(),
                move |ctx: Ctx<'js>,
                      this: This<Object<'js>>,
                      value: Opt<JsValue<'js>>|
                      -> rquickjs::Result<()> {
                    let queue = this_queue(&ctx, &queues, &this.0)?;
                    let value = value
                        .0
                        .unwrap_or_else(|| JsValue::new_undefined(ctx.clone()));
                    let message =
                        convert::from_js(&value, &lent, &settings).map_err(|err| err.throw(&ctx))?;
                    queue
                        .push(message)
                        .map_err(|err| Exception::throw_message(&ctx, &err.to_string()))
                },
            )
        }
        QueueOp::Pop => Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>, this: This<Object<'js>>| -> rquickjs::Result<JsValue<'js>> {
                match this_queue(&ctx, &queues, &this.0)?.pop_value() {
                    Some(value) => convert::to_js(&ctx, value),
                    None => Ok(JsValue::new_undefined(ctx.clone())),
                }
            },
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scriptq_core::{map, BindingRegistry, Key, Map, Value};

    #[derive(Clone, Debug, PartialEq)]
    struct Temporary {
        x: i32,
    }

    scriptq_core::define_extension! {
        enum TestExt {
            Temporary(Temporary),
        }
    }

    impl IntoScript for TestExt {
        fn into_script<'js>(self, ctx: &Ctx<'js>) -> rquickjs::Result<JsValue<'js>> {
            match self {
                TestExt::Temporary(temp) => {
                    let object = Object::new(ctx.clone())?;
                    object.set("x", temp.x)?;
                    Ok(JsValue::from_object(object))
                }
            }
        }
    }

    fn exposed<E: IntoScript>(runtime: &ScriptRuntime<E>) -> Arc<MessageQueue<E>> {
        let queue = Arc::new(MessageQueue::new());
        queue
            .expose(runtime, &BindingRegistry::new(), "lqueue")
            .unwrap();
        queue
    }

    #[test]
    fn script_pushes_and_pops_scalars() {
        let runtime: ScriptRuntime = ScriptRuntime::new().unwrap();
        let queue = exposed(&runtime);

        runtime
            .execute(
                r#"
                lqueue.push("MOCK MESSAGE");
                var size = lqueue.size();
                var got = lqueue.pop();
                var empty = lqueue.pop() === undefined;
                "#,
            )
            .unwrap();

        assert_eq!(runtime.read_global::<u32>("size").unwrap(), 1);
        assert_eq!(runtime.read_global::<String>("got").unwrap(), "MOCK MESSAGE");
        assert!(runtime.read_global::<bool>("empty").unwrap());
        assert!(queue.is_empty());
    }

    #[test]
    fn script_table_is_readable_from_host() {
        let runtime: ScriptRuntime = ScriptRuntime::new().unwrap();
        let queue = exposed(&runtime);

        runtime
            .execute(r#"lqueue.push({ type: "MOCK MESSAGE", nested: { flag: true }, 7: { 3: 5.8 } });"#)
            .unwrap();

        let msg = queue.pop().unwrap();
        assert_eq!(msg.get("type").unwrap().cast::<String>().unwrap(), "MOCK MESSAGE");
        assert!(*msg.get("nested").unwrap().get("flag").unwrap().cast::<bool>().unwrap());
        assert_eq!(*msg.get(7).unwrap().get(3).unwrap().cast::<f64>().unwrap(), 5.8);
    }

    #[test]
    fn host_map_is_readable_from_script() {
        let runtime: ScriptRuntime = ScriptRuntime::new().unwrap();
        let queue = exposed(&runtime);
        queue
            .push(map! {
                "type" => "FROM HOST",
                "count" => 3,
                "ratio" => 0.5,
                2 => map! { "ok" => true },
            })
            .unwrap();

        runtime
            .execute(
                r#"
                var m = lqueue.pop();
                var kind = m.type;
                var count = m.count;
                var ratio = m.ratio;
                var ok = m[2].ok;
                "#,
            )
            .unwrap();

        assert_eq!(runtime.read_global::<String>("kind").unwrap(), "FROM HOST");
        assert_eq!(runtime.read_global::<i32>("count").unwrap(), 3);
        assert_eq!(runtime.read_global::<f64>("ratio").unwrap(), 0.5);
        assert!(runtime.read_global::<bool>("ok").unwrap());
    }

    #[test]
    fn script_arrays_become_integer_keyed_maps() {
        let runtime: ScriptRuntime = ScriptRuntime::new().unwrap();
        let queue = exposed(&runtime);

        runtime.execute(r#"lqueue.push(["a", "b", { c: 1 }]);"#).unwrap();

        let value = queue.pop_value().unwrap();
        let Value::Map(map) = &value else {
            panic!("expected a map, got {value:?}");
        };
        assert_eq!(map.len(), 3);
        assert_eq!(value.get(0).unwrap(), &Value::from("a"));
        assert_eq!(value.get(2).unwrap().get("c").unwrap(), &Value::Int(1));
    }

    #[test]
    fn lent_storage_is_copied_on_push() {
        let runtime: ScriptRuntime<TestExt> = ScriptRuntime::new().unwrap();
        let queue = exposed(&runtime);
        let storage = Arc::new(RwLock::new(Temporary { x: 7 }));
        let storage_addr = Arc::as_ptr(&storage) as usize;
        runtime.lend("ltemporary", &storage).unwrap();

        runtime
            .execute("lqueue.push(ltemporary); lqueue.push({ temp: ltemporary });")
            .unwrap();
        drop(storage);

        let direct = queue.pop().unwrap();
        let copy = direct.cast::<Temporary>().unwrap();
        assert_eq!(copy.x, 7);
        assert_ne!(copy as *const Temporary as usize, storage_addr);

        let wrapped = queue.pop().unwrap();
        assert_eq!(wrapped.get("temp").unwrap().cast::<Temporary>().unwrap().x, 7);
    }

    #[test]
    fn extension_payloads_reach_the_script() {
        let runtime: ScriptRuntime<TestExt> = ScriptRuntime::new().unwrap();
        let queue = exposed(&runtime);
        queue.push(Value::ext(Temporary { x: 11 })).unwrap();

        runtime.execute("var x = lqueue.pop().x;").unwrap();
        assert_eq!(runtime.read_global::<i32>("x").unwrap(), 11);
    }

    #[test]
    fn released_or_dropped_storage_cannot_be_pushed() {
        let runtime: ScriptRuntime<TestExt> = ScriptRuntime::new().unwrap();
        let queue = exposed(&runtime);

        let released = Arc::new(RwLock::new(Temporary { x: 1 }));
        let handle = runtime.lend("lreleased", &released).unwrap();
        assert!(runtime.release(handle));

        let dropped = Arc::new(RwLock::new(Temporary { x: 2 }));
        runtime.lend("ldropped", &dropped).unwrap();
        drop(dropped);

        runtime
            .execute(
                r#"
                try { lqueue.push(lreleased); var releasedErr = "none"; }
                catch (e) { var releasedErr = e.name; }
                try { lqueue.push({ ok: 1, temp: ldropped }); var droppedErr = "none"; }
                catch (e) { var droppedErr = e.name; }
                "#,
            )
            .unwrap();

        assert_eq!(runtime.read_global::<String>("releasedErr").unwrap(), "TypeError");
        assert_eq!(runtime.read_global::<String>("droppedErr").unwrap(), "Error");
        assert!(queue.is_empty());
    }

    #[test]
    fn unsupported_values_throw_and_leave_queue_unchanged() {
        let runtime: ScriptRuntime = ScriptRuntime::new().unwrap();
        let queue = exposed(&runtime);

        runtime
            .execute(
                r#"
                var failures = 0;
                var attempts = [
                    function () { lqueue.push(undefined); },
                    function () { lqueue.push(); },
                    function () { lqueue.push(null); },
                    function () { lqueue.push({ f: function () {} }); },
                ];
                for (var i = 0; i < attempts.length; i++) {
                    try { attempts[i](); } catch (e) { if (e instanceof TypeError) failures++; }
                }
                "#,
            )
            .unwrap();

        assert_eq!(runtime.read_global::<u32>("failures").unwrap(), 4);
        assert!(queue.is_empty());
    }

    #[test]
    fn cyclic_tables_hit_the_depth_limit() {
        let runtime: ScriptRuntime = ScriptRuntime::new().unwrap();
        let queue = exposed(&runtime);

        runtime
            .execute(
                r#"
                var a = {};
                a.self = a;
                var message = "";
                try { lqueue.push(a); } catch (e) { message = e.message; }
                "#,
            )
            .unwrap();

        let message = runtime.read_global::<String>("message").unwrap();
        assert!(message.contains("nesting exceeds"), "{message}");
        assert!(queue.is_empty());
    }

    #[test]
    fn binding_registers_once_per_runtime() {
        let runtime: ScriptRuntime = ScriptRuntime::new().unwrap();
        let registry = BindingRegistry::new();
        let first = Arc::new(MessageQueue::new());
        let second = Arc::new(MessageQueue::new());

        first.expose(&runtime, &registry, "first").unwrap();
        second.expose(&runtime, &registry, "second").unwrap();
        first.expose(&runtime, &registry, "first").unwrap();

        assert_eq!(registry.len(), 1);
        assert!(registry.is_bound(runtime.id()));

        runtime.execute("first.push(1); second.push(2); second.push(3);").unwrap();
        assert_eq!(first.size(), 1);
        assert_eq!(second.size(), 2);
    }

    #[test]
    fn a_published_name_keeps_its_queue() {
        let runtime: ScriptRuntime = ScriptRuntime::new().unwrap();
        let registry = BindingRegistry::new();
        let first = Arc::new(MessageQueue::new());
        let second = Arc::new(MessageQueue::new());

        first.expose(&runtime, &registry, "q").unwrap();
        let err = second.expose(&runtime, &registry, "q").unwrap_err();
        assert!(matches!(err, ScriptError::NameTaken { ref name } if name == "q"));
        first.expose(&runtime, &registry, "q").unwrap();

        assert!(first.is_exposed(&runtime, "q").unwrap());
        assert!(!second.is_exposed(&runtime, "q").unwrap());

        runtime.execute("q.push(1);").unwrap();
        assert_eq!(first.size(), 1);
        assert_eq!(second.size(), 0);
    }

    #[test]
    fn colliding_keys_are_rejected_on_pop() {
        let runtime: ScriptRuntime = ScriptRuntime::new().unwrap();
        let queue = exposed(&runtime);

        let mut colliding = Map::new();
        colliding.insert(Key::Int(7), Value::from("int"));
        colliding.insert(Key::from("7"), Value::from("str"));
        queue.push(Value::Map(colliding)).unwrap();

        runtime
            .execute(
                r#"
                var err = "none";
                try { lqueue.pop(); } catch (e) { err = e.name; }
                "#,
            )
            .unwrap();
        assert_eq!(runtime.read_global::<String>("err").unwrap(), "TypeError");
    }

    #[test]
    fn queue_handles_resolve_to_the_same_queue() {
        let runtime: ScriptRuntime = ScriptRuntime::new().unwrap();
        let queue = exposed(&runtime);

        let handle = runtime.queue_handle("lqueue").unwrap().unwrap();
        assert!(Arc::ptr_eq(&runtime.queue(handle).unwrap(), &queue));
        assert_eq!(runtime.queue_handle("missing").unwrap(), None);
    }

    #[test]
    fn methods_reject_foreign_this() {
        let runtime: ScriptRuntime = ScriptRuntime::new().unwrap();
        let _queue = exposed(&runtime);

        let rejected: bool = runtime
            .eval("(function () { try { lqueue.size.call({}); return false; } catch (e) { return e instanceof TypeError; } })()")
            .unwrap();
        assert!(rejected);
    }

    #[test]
    fn uncaught_exceptions_are_reported() {
        let runtime: ScriptRuntime = ScriptRuntime::new().unwrap();

        let err = runtime.execute("throw new Error('boom');").unwrap_err();
        match err {
            ScriptError::Exception(message) => assert!(message.contains("boom"), "{message}"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn globals_round_trip() {
        let runtime: ScriptRuntime = ScriptRuntime::new().unwrap();
        runtime.set_global("limit", 12u32).unwrap();
        runtime.execute("function double() { limit = limit * 2; }").unwrap();
        runtime.call_function("double").unwrap();
        assert_eq!(runtime.read_global::<u32>("limit").unwrap(), 24);
    }

    #[test]
    fn integer_keys_setting_is_honoured() {
        let settings = ScriptSettings {
            integer_keys: false,
            ..ScriptSettings::default()
        };
        let runtime: ScriptRuntime = ScriptRuntime::with_settings(settings).unwrap();
        let queue = exposed(&runtime);

        runtime.execute("lqueue.push({ 7: true });").unwrap();
        let mut expected = Map::new();
        expected.insert(Key::from("7"), Value::Bool(true));
        assert_eq!(queue.pop_value().unwrap(), Value::Map(expected));
    }
}
