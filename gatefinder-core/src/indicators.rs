/// Signals that a page hosts a login form. All entries are lower case; the
/// classifier lower-cases the body before matching.
#[derive(Debug, Clone, Copy)]
pub struct LoginIndicators {
    /// Words that show up in form ids, classes and actions.
    pub form_attributes: &'static [&'static str],
    /// Input types counted as `type="<name>"` markers.
    pub input_types: &'static [&'static str],
    /// Submit button and label captions.
    pub button_texts: &'static [&'static str],
    pub keywords: &'static [&'static str],
    /// Registration and password-recovery vocabulary.
    pub exclusions: &'static [&'static str],
}

pub static DEFAULT_INDICATORS: LoginIndicators = LoginIndicators {
    form_attributes: &["login", "signin", "sign-in", "logon", "authenticate"],
    input_types: &["password", "text", "email", "tel"],
    button_texts: &[
        "登录", "登陆", "sign in", "signin", "login", "log in", "submit", "确定", "提交",
    ],
    keywords: &[
        "用户名", "账号", "account", "username", "密码", "password", "登录", "login", "signin",
        "sign in", "sign-in",
    ],
    exclusions: &["注册", "register", "signup", "忘记密码", "找回密码"],
};

impl Default for LoginIndicators {
    fn default() -> Self {
        DEFAULT_INDICATORS
    }
}
